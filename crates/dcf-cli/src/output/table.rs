use serde_json::Value;
use tabled::{builder::Builder, Table};

use super::{flatten_rows, scalar_text};

/// Format output as a two-column table using the tabled crate.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(result) = map.get("result") {
                print_rows(result);
                print_envelope_notes(map);
            } else {
                print_rows(value);
            }
        }
        _ => println!("{}", scalar_text(value)),
    }
}

fn print_rows(value: &Value) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in flatten_rows(value) {
        builder.push_record([key, val]);
    }
    println!("{}", Table::from(builder));
}

fn print_envelope_notes(envelope: &serde_json::Map<String, Value>) {
    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}
