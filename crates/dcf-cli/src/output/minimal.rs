use serde_json::Value;

use super::scalar_text;

/// Headline figure, searched in this order.
const PRIORITY_KEYS: [&str; 4] = ["equity_value", "mean", "enterprise_value", "wacc"];

/// Print just the key answer value from the output.
pub fn print_minimal(value: &Value) {
    println!("{}", headline(value));
}

fn headline(value: &Value) -> String {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);
    // Analysis reports nest the point valuation
    let target = result_obj.get("valuation").unwrap_or(result_obj);

    if let Value::Object(map) = target {
        for key in PRIORITY_KEYS {
            if let Some(val) = map.get(key) {
                if !val.is_null() {
                    return scalar_text(val);
                }
            }
        }
        if let Some((key, val)) = map.iter().next() {
            return format!("{}: {}", key, scalar_text(val));
        }
    }

    scalar_text(target)
}
