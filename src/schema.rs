use crate::errors::{AppError, AppResult};
use serde_json::{json, Value};

fn rule_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "min_sales": { "type": "integer", "minimum": 0 },
            "min_ctr": { "type": "number", "minimum": 0, "maximum": 1 },
            "min_views": { "type": "integer", "minimum": 0 },
            "min_days_listed": { "type": "integer", "minimum": 0 },
            "min_repeat_purchase": { "type": "integer", "minimum": 0 },
            "min_customer_retention": { "type": "number", "minimum": 0, "maximum": 1 },
            "min_revenue": { "type": "integer", "minimum": 0 },
            "min_days_in_step2": { "type": "integer", "minimum": 0 }
        },
        "additionalProperties": false
    })
}

pub fn criteria_payload_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "step1_to_step2": rule_schema(),
            "step2_to_step3": rule_schema(),
            "category_adjusted": {
                "type": "object",
                "additionalProperties": rule_schema()
            }
        },
        "required": ["category_adjusted"]
    })
}

pub fn category_mapping_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": rule_schema()
    })
}

// Malformed entries are rejected and reported, never silently coerced.
pub fn validate_criteria_payload(value: &Value) -> AppResult<()> {
    check(value, &criteria_payload_schema(), "lifecycle criteria payload")
}

pub fn validate_category_mapping(value: &Value) -> AppResult<()> {
    check(value, &category_mapping_schema(), "category override mapping")
}

fn check(value: &Value, schema: &Value, label: &str) -> AppResult<()> {
    let compiled = jsonschema::JSONSchema::compile(schema)
        .map_err(|error| AppError::Internal(format!("{} schema failed to compile: {}", label, error)))?;

    let errors: Vec<String> = compiled
        .validate(value)
        .err()
        .map(|errors| {
            errors
                .map(|error| {
                    let path = error.instance_path.to_string();
                    if path.is_empty() {
                        error.to_string()
                    } else {
                        format!("{}: {}", path, error)
                    }
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Parse(format!(
            "{} rejected: {}",
            label,
            errors.join("; ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_category_mapping, validate_criteria_payload};

    #[test]
    fn accepts_a_well_formed_payload() {
        let payload = serde_json::json!({
            "step1_to_step2": { "min_sales": 3, "min_ctr": 0.02 },
            "step2_to_step3": { "min_revenue": 100000 },
            "category_adjusted": {
                "패션의류": { "min_sales": 2, "min_customer_retention": 0.4 }
            }
        });
        assert!(validate_criteria_payload(&payload).is_ok());
    }

    #[test]
    fn rejects_malformed_category_entries() {
        let payload = serde_json::json!({
            "category_adjusted": { "패션의류": { "min_ctr": 1.5 } }
        });
        let error = validate_criteria_payload(&payload).expect_err("should reject");
        assert!(error.to_string().contains("min_ctr"));

        let not_an_object = serde_json::json!({ "category_adjusted": { "패션의류": 3 } });
        assert!(validate_criteria_payload(&not_an_object).is_err());
    }

    #[test]
    fn rejects_unknown_rule_fields() {
        let mapping = serde_json::json!({ "패션의류": { "min_salez": 2 } });
        assert!(validate_category_mapping(&mapping).is_err());
    }

    #[test]
    fn missing_category_adjusted_is_an_error() {
        let payload = serde_json::json!({ "step1_to_step2": {} });
        assert!(validate_criteria_payload(&payload).is_err());
    }
}
