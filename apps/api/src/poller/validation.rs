use std::collections::BTreeMap;

use super::JobError;

/// Checks a submission payload before anything reaches the network.
///
/// FAIL conditions:
/// - every value is blank (or there are no fields at all)
/// - any of `required` is missing or blank
pub fn validate_parameters(
    required: &[&str],
    parameters: &BTreeMap<String, String>,
) -> Result<(), JobError> {
    if parameters.values().all(|v| v.trim().is_empty()) {
        return Err(JobError::Validation(match required {
            [] => "Submission is empty".to_string(),
            fields => format!("Please fill in: {}", fields.join(", ")),
        }));
    }

    let missing = missing_fields(required, parameters);
    if !missing.is_empty() {
        return Err(JobError::Validation(format!(
            "Please fill in: {}",
            missing.join(", ")
        )));
    }

    Ok(())
}

/// Required fields that are absent or whitespace-only, in declaration order.
pub fn missing_fields<'a>(required: &[&'a str], parameters: &BTreeMap<String, String>) -> Vec<&'a str> {
    required
        .iter()
        .copied()
        .filter(|field| {
            parameters
                .get(*field)
                .map(|v| v.trim().is_empty())
                .unwrap_or(true)
        })
        .collect()
}
