//! Photo records returned by the image API, and the check that turns a raw
//! JSON payload into one.

use reqwest::Url;
use serde_json::{Map, Value};

use crate::error::{FieldIssue, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoUser {
    pub id: String,
    pub username: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoUrls {
    pub raw: String,
    pub full: String,
    pub regular: String,
    pub small: String,
    pub thumb: String,
}

/// A validated photo. Only constructed through [`Photo::from_json`] or by
/// tests; the session never inspects it beyond cloning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub id: String,
    pub alt_description: Option<String>,
    pub description: Option<String>,
    pub urls: PhotoUrls,
    pub user: PhotoUser,
    pub width: u32,
    pub height: u32,
}

impl Photo {
    /// Alt text, falling back to a generic label.
    pub fn alt_text(&self) -> &str {
        self.alt_description.as_deref().unwrap_or("Pelican photo")
    }

    /// Photographer profile link with the referral parameters the API
    /// guidelines ask for.
    pub fn profile_url(&self) -> String {
        format!(
            "https://unsplash.com/@{}?utm_source=pelican_slideshow&utm_medium=referral",
            self.user.username
        )
    }

    /// Checks `value` against the photo schema, collecting every issue.
    ///
    /// Unknown fields are ignored; the API returns many more than we keep.
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let mut issues = Vec::new();
        let Some(obj) = value.as_object() else {
            return Err(ValidationError {
                issues: vec![issue("", "expected object")],
            });
        };

        let id = string_field(obj, "", "id", &mut issues);
        let alt_description = nullable_string_field(obj, "", "alt_description", &mut issues);
        let description = nullable_string_field(obj, "", "description", &mut issues);
        let width = dimension_field(obj, "width", &mut issues);
        let height = dimension_field(obj, "height", &mut issues);

        let urls = match object_field(obj, "urls", &mut issues) {
            Some(urls) => {
                let mut url = |name| url_field(urls, name, &mut issues);
                let raw = url("raw");
                let full = url("full");
                let regular = url("regular");
                let small = url("small");
                let thumb = url("thumb");
                match (raw, full, regular, small, thumb) {
                    (Some(raw), Some(full), Some(regular), Some(small), Some(thumb)) => {
                        Some(PhotoUrls {
                            raw,
                            full,
                            regular,
                            small,
                            thumb,
                        })
                    }
                    _ => None,
                }
            }
            None => None,
        };

        let user = match object_field(obj, "user", &mut issues) {
            Some(user) => {
                let id = string_field(user, "user.", "id", &mut issues);
                let username = string_field(user, "user.", "username", &mut issues);
                let name = string_field(user, "user.", "name", &mut issues);
                match (id, username, name) {
                    (Some(id), Some(username), Some(name)) => Some(PhotoUser { id, username, name }),
                    _ => None,
                }
            }
            None => None,
        };

        match (id, alt_description, description, urls, user, width, height) {
            (
                Some(id),
                Some(alt_description),
                Some(description),
                Some(urls),
                Some(user),
                Some(width),
                Some(height),
            ) if issues.is_empty() => Ok(Self {
                id,
                alt_description,
                description,
                urls,
                user,
                width,
                height,
            }),
            _ => Err(ValidationError { issues }),
        }
    }
}

fn issue(path: &str, message: &str) -> FieldIssue {
    FieldIssue {
        path: path.to_owned(),
        message: message.to_owned(),
    }
}

fn string_field(
    obj: &Map<String, Value>,
    prefix: &str,
    name: &str,
    issues: &mut Vec<FieldIssue>,
) -> Option<String> {
    let path = format!("{prefix}{name}");
    match obj.get(name) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            issues.push(issue(&path, "expected string"));
            None
        }
        None => {
            issues.push(issue(&path, "required"));
            None
        }
    }
}

// Outer `Option` is presence/validity, inner is the JSON null.
fn nullable_string_field(
    obj: &Map<String, Value>,
    prefix: &str,
    name: &str,
    issues: &mut Vec<FieldIssue>,
) -> Option<Option<String>> {
    let path = format!("{prefix}{name}");
    match obj.get(name) {
        Some(Value::Null) => Some(None),
        Some(Value::String(s)) => Some(Some(s.clone())),
        Some(_) => {
            issues.push(issue(&path, "expected string or null"));
            None
        }
        None => {
            issues.push(issue(&path, "required"));
            None
        }
    }
}

fn dimension_field(
    obj: &Map<String, Value>,
    name: &str,
    issues: &mut Vec<FieldIssue>,
) -> Option<u32> {
    match obj.get(name) {
        Some(Value::Number(n)) => match whole_number(n).and_then(|v| u32::try_from(v).ok()) {
            Some(v) => Some(v),
            None => {
                issues.push(issue(name, "expected non-negative integer"));
                None
            }
        },
        Some(_) => {
            issues.push(issue(name, "expected number"));
            None
        }
        None => {
            issues.push(issue(name, "required"));
            None
        }
    }
}

// Integral floats such as `4000.0` count as whole numbers.
fn whole_number(n: &serde_json::Number) -> Option<u64> {
    n.as_u64().or_else(|| {
        n.as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= f64::from(u32::MAX))
            .map(|f| f as u64)
    })
}

fn object_field<'a>(
    obj: &'a Map<String, Value>,
    name: &str,
    issues: &mut Vec<FieldIssue>,
) -> Option<&'a Map<String, Value>> {
    match obj.get(name) {
        Some(Value::Object(inner)) => Some(inner),
        Some(_) => {
            issues.push(issue(name, "expected object"));
            None
        }
        None => {
            issues.push(issue(name, "required"));
            None
        }
    }
}

fn url_field(
    urls: &Map<String, Value>,
    name: &str,
    issues: &mut Vec<FieldIssue>,
) -> Option<String> {
    let raw = string_field(urls, "urls.", name, issues)?;
    match Url::parse(&raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Some(raw),
        Ok(_) => {
            issues.push(issue(&format!("urls.{name}"), "expected http(s) url"));
            None
        }
        Err(_) => {
            issues.push(issue(&format!("urls.{name}"), "invalid url"));
            None
        }
    }
}
