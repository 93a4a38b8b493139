use serde_json::Value;
use std::io;

use super::flatten_rows;

/// Write the result as `field,value` CSV to stdout.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    let body = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    let _ = wtr.write_record(["field", "value"]);
    for (key, val) in flatten_rows(body) {
        let text = if val == "null" { String::new() } else { val };
        let _ = wtr.write_record([key, text]);
    }

    let _ = wtr.flush();
}
