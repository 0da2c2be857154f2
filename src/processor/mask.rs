use serde::Serialize;

/// Keep the last four characters of a card number.
pub fn mask_card(card: &str) -> String {
    let len = card.chars().count();
    if len > 4 {
        let tail: String = card.chars().skip(len - 4).collect();
        "*".repeat(len - 4) + &tail
    } else {
        card.to_string()
    }
}

/// Return true if a key name likely holds a PAN/card number.
fn is_pan_key(key: &str) -> bool {
    let k = key.to_lowercase();
    k == "pan"
        || k == "card"
        || k.contains("card") && (k.contains("number") || k.contains("num"))
        || k.contains("cardnumber")
}

/// Return true if a key name holds a CVV/CVC or a secret.
fn is_secret_key(key: &str) -> bool {
    let k = key.to_lowercase();
    k.contains("cvv") || k.contains("cvc") || k.contains("private_key")
}

pub fn secure_serializable(v: impl Serialize) -> serde_json::Value {
    match serde_json::to_value(v) {
        Ok(value) => secure_value(&value),
        Err(e) => serde_json::Value::String(format!("<unserializable: {e}>")),
    }
}

pub fn secure_value(v: &serde_json::Value) -> serde_json::Value {
    use serde_json::Value;

    match v {
        Value::Object(map) => {
            let mut new = serde_json::Map::with_capacity(map.len());
            for (k, val) in map {
                let new_val = match val {
                    Value::String(_) | Value::Number(_) if is_secret_key(k) => {
                        Value::String("***".to_string())
                    }
                    Value::String(s) if is_pan_key(k) => Value::String(mask_card(s)),
                    Value::Number(n) if is_pan_key(k) => Value::String(mask_card(&n.to_string())),
                    _ => secure_value(val),
                };
                new.insert(k.clone(), new_val);
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(secure_value).collect()),
        other => other.clone(),
    }
}
