//! Outbound payload schema
//!
//! Declarative description of the request shapes the Send API accepts:
//! text, quick reply and generic image template. Used to catch encoder bugs
//! in tests and tooling, not on the request path.
//!
//! Objects are closed: keys not listed in the schema are rejected, so a
//! payload must match one alternative exactly.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::platform::SendRequest;

static SEND_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://graph\.facebook\.com/v2\.6/me/messages\?access_token=.+")
        .expect("send url pattern")
});

/// First violation found while checking a value against a schema
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{path}: {reason}")]
pub struct Violation {
    pub path: String,
    pub reason: String,
}

/// The value matched none of the alternatives
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Message sent to Facebook Messenger matches no known shape: {}", summary(.attempts))]
pub struct ValidationError {
    pub attempts: Vec<(&'static str, Violation)>,
}

fn summary(attempts: &[(&'static str, Violation)]) -> String {
    attempts
        .iter()
        .map(|(name, violation)| format!("{} ({})", name, violation))
        .collect::<Vec<_>>()
        .join("; ")
}

// =============================================================================
// Schema
// =============================================================================

/// String constraints
#[derive(Debug, Clone, Default)]
pub struct Text {
    pub max: Option<usize>,
    pub pattern: Option<&'static LazyLock<Regex>>,
    pub schemes: Option<&'static [&'static str]>,
}

#[derive(Debug, Clone)]
pub enum Schema {
    /// Closed object
    Object(Vec<Field>),
    Array(Box<Schema>),
    /// Non-empty string
    Str(Text),
    /// Exact string
    Literal(&'static str),
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: &'static str,
    pub required: bool,
    pub schema: Schema,
}

fn required(name: &'static str, schema: Schema) -> Field {
    Field {
        name,
        required: true,
        schema,
    }
}

fn optional(name: &'static str, schema: Schema) -> Field {
    Field {
        name,
        required: false,
        schema,
    }
}

fn string() -> Schema {
    Schema::Str(Text::default())
}

fn max(limit: usize) -> Schema {
    Schema::Str(Text {
        max: Some(limit),
        ..Text::default()
    })
}

impl Schema {
    pub fn check(&self, value: &Value) -> Result<(), Violation> {
        self.check_at("", value)
    }

    fn check_at(&self, path: &str, value: &Value) -> Result<(), Violation> {
        let violation = |reason: String| Violation {
            path: if path.is_empty() { "$".to_string() } else { path.to_string() },
            reason,
        };

        match self {
            Schema::Object(fields) => {
                let Value::Object(map) = value else {
                    return Err(violation("must be an object".to_string()));
                };
                check_fields(path, fields, map)
            }
            Schema::Array(items) => {
                let Value::Array(values) = value else {
                    return Err(violation("must be an array".to_string()));
                };
                values
                    .iter()
                    .enumerate()
                    .try_for_each(|(i, item)| items.check_at(&format!("{}[{}]", path, i), item))
            }
            Schema::Literal(expected) => match value {
                Value::String(s) if s == expected => Ok(()),
                _ => Err(violation(format!("must be \"{}\"", expected))),
            },
            Schema::Str(rule) => {
                let Value::String(s) = value else {
                    return Err(violation("must be a string".to_string()));
                };
                if s.is_empty() {
                    return Err(violation("must not be empty".to_string()));
                }
                if let Some(limit) = rule.max
                    && s.chars().count() > limit
                {
                    return Err(violation(format!("must be at most {} characters", limit)));
                }
                if let Some(pattern) = rule.pattern
                    && !pattern.is_match(s)
                {
                    return Err(violation(format!("must match {}", pattern.as_str())));
                }
                if let Some(schemes) = rule.schemes {
                    let scheme_ok = url::Url::parse(s)
                        .map(|u| schemes.iter().any(|scheme| *scheme == u.scheme()))
                        .unwrap_or(false);
                    if !scheme_ok {
                        return Err(violation(format!("must be a {} uri", schemes.join("/"))));
                    }
                }
                Ok(())
            }
        }
    }
}

fn check_fields(path: &str, fields: &[Field], map: &Map<String, Value>) -> Result<(), Violation> {
    let child = |name: &str| {
        if path.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", path, name)
        }
    };

    for field in fields {
        match map.get(field.name) {
            Some(value) => field.schema.check_at(&child(field.name), value)?,
            None if field.required => {
                return Err(Violation {
                    path: child(field.name),
                    reason: "is required".to_string(),
                });
            }
            None => {}
        }
    }

    if let Some(unknown) = map.keys().find(|key| !fields.iter().any(|f| f.name == key.as_str())) {
        return Err(Violation {
            path: child(unknown.as_str()),
            reason: "is not allowed".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Send API shapes
// =============================================================================

/// One accepted request shape
#[derive(Debug, Clone)]
pub struct Shape {
    pub description: &'static str,
    pub api_doc: &'static str,
    pub schema: Schema,
}

/// `{url, body: {recipient: {id}, message}}` around a message schema
fn envelope(message: Schema) -> Schema {
    Schema::Object(vec![
        required(
            "url",
            Schema::Str(Text {
                pattern: Some(&SEND_URL),
                ..Text::default()
            }),
        ),
        required(
            "body",
            Schema::Object(vec![
                required("recipient", Schema::Object(vec![required("id", string())])),
                required("message", message),
            ]),
        ),
    ])
}

static SHAPES: LazyLock<Vec<Shape>> = LazyLock::new(|| {
    vec![
        Shape {
            description: "Text message",
            api_doc: "https://developers.facebook.com/docs/messenger-platform/reference/send-api#message",
            schema: envelope(Schema::Object(vec![required("text", max(2000))])),
        },
        Shape {
            description: "Quick reply",
            api_doc: "https://developers.facebook.com/docs/messenger-platform/reference/send-api/quick-replies",
            schema: envelope(Schema::Object(vec![
                required("text", max(2000)),
                optional(
                    "quick_replies",
                    Schema::Array(Box::new(Schema::Object(vec![
                        optional("content_type", Schema::Literal("text")),
                        optional("title", max(20)),
                        required("payload", max(1000)),
                        optional(
                            "image_url",
                            Schema::Str(Text {
                                schemes: Some(&["http", "https"]),
                                ..Text::default()
                            }),
                        ),
                    ]))),
                ),
            ])),
        },
        Shape {
            description: "Image message",
            api_doc: "https://developers.facebook.com/docs/messenger-platform/reference/template/generic",
            schema: envelope(Schema::Object(vec![required(
                "attachment",
                Schema::Object(vec![
                    required("type", Schema::Literal("template")),
                    required(
                        "payload",
                        Schema::Object(vec![
                            required("template_type", Schema::Literal("generic")),
                            required(
                                "elements",
                                Schema::Array(Box::new(Schema::Object(vec![
                                    optional("title", max(80)),
                                    optional("image_url", string()),
                                ]))),
                            ),
                        ]),
                    ),
                ]),
            )])),
        },
    ]
});

/// All accepted shapes, in the order they are tried
pub fn shapes() -> &'static [Shape] {
    &SHAPES
}

/// Check a `{url, body}` value against every shape
///
/// Returns the description of the first matching shape.
pub fn validate_value(value: &Value) -> Result<&'static str, ValidationError> {
    let mut attempts = Vec::new();
    for shape in shapes() {
        match shape.schema.check(value) {
            Ok(()) => return Ok(shape.description),
            Err(violation) => attempts.push((shape.description, violation)),
        }
    }
    Err(ValidationError { attempts })
}

/// Check an encoded request descriptor
pub fn validate(request: &SendRequest) -> Result<&'static str, ValidationError> {
    let body = serde_json::to_value(&request.body).unwrap_or(Value::Null);
    validate_value(&json!({"url": request.url(), "body": body}))
}
