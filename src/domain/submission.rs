use serde::{Deserialize, Serialize};
use serde_json::Value;

const FIELDS: [&str; 3] = ["name", "message", "phone"];

/// A contact-form submission as posted by the front-end.
#[derive(Clone, Debug, Deserialize)]
pub struct Submission {
    pub name: String,
    pub message: String,
    pub phone: String,
}

/// Upper bounds on submission fields, in characters. `None` means unbounded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FieldLimits {
    pub name: Option<usize>,
    pub phone: Option<usize>,
}

/// One entry of a 422 response body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl FieldLimits {
    pub fn unbounded() -> Self {
        Self::default()
    }
}

impl FieldViolation {
    fn too_long(field: &str, limit: usize) -> Self {
        FieldViolation {
            loc: vec!["body".into(), field.into()],
            msg: format!("ensure this value has at most {} characters", limit),
            kind: "value_error.any_str.max_length".into(),
        }
    }

    fn missing(field: &str) -> Self {
        FieldViolation {
            loc: vec!["body".into(), field.into()],
            msg: "field required".into(),
            kind: "value_error.missing".into(),
        }
    }

    fn null(field: &str) -> Self {
        FieldViolation {
            loc: vec!["body".into(), field.into()],
            msg: "none is not an allowed value".into(),
            kind: "type_error.none.not_allowed".into(),
        }
    }

    fn not_a_string(field: &str) -> Self {
        FieldViolation {
            loc: vec!["body".into(), field.into()],
            msg: "str type expected".into(),
            kind: "type_error.str".into(),
        }
    }

    fn not_an_object() -> Self {
        FieldViolation {
            loc: vec!["body".into()],
            msg: "value is not a valid dict".into(),
            kind: "type_error.dict".into(),
        }
    }

    fn undecodable(error: &serde_json::Error) -> Self {
        FieldViolation {
            loc: vec!["body".into()],
            msg: error.to_string(),
            kind: "value_error.jsondecode".into(),
        }
    }
}

impl Submission {
    /// Deserialize a request body and check it against `limits`.
    ///
    /// Every missing or mistyped field is reported, in declaration order.
    pub fn parse(body: &[u8], limits: FieldLimits) -> Result<Self, Vec<FieldViolation>> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| vec![FieldViolation::undecodable(&e)])?;
        let object = value
            .as_object()
            .ok_or_else(|| vec![FieldViolation::not_an_object()])?;

        let violations: Vec<_> = FIELDS
            .iter()
            .filter_map(|&field| match object.get(field) {
                None => Some(FieldViolation::missing(field)),
                Some(Value::Null) => Some(FieldViolation::null(field)),
                Some(Value::String(_)) => None,
                Some(_) => Some(FieldViolation::not_a_string(field)),
            })
            .collect();
        if !violations.is_empty() {
            return Err(violations);
        }

        let submission: Submission =
            serde_json::from_value(value).map_err(|e| vec![FieldViolation::undecodable(&e)])?;

        let violations = submission.violations(limits);
        if violations.is_empty() {
            Ok(submission)
        } else {
            Err(violations)
        }
    }

    pub fn violations(&self, limits: FieldLimits) -> Vec<FieldViolation> {
        [
            ("name", self.name.as_str(), limits.name),
            ("phone", self.phone.as_str(), limits.phone),
        ]
        .into_iter()
        .filter_map(|(field, value, limit)| {
            let limit = limit?;
            (value.chars().count() > limit).then(|| FieldViolation::too_long(field, limit))
        })
        .collect()
    }
}
