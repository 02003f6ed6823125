use std::collections::{BTreeMap, HashMap};
use std::fmt;

use jsonschema::Validator;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ComplianceError, Result};
use crate::section::{Category, Section};
use crate::types::{whole_floors, BuildingInfo, ComplianceRequest, ComplianceResponse, PartialReport};

const SCHEMA_JSON: &str = include_str!("../../../schema/compliance.schema.json");

/// Field path (dotted, e.g. `escapeSolutions.0.content`) to messages.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Field-level validation failure. Never a bare message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationError {
    errors: FieldErrors,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut err = Self::new();
        err.add(field, message);
        err
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn into_errors(self) -> FieldErrors {
        self.errors
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.errors {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                first = false;
                write!(f, "{field}: {message}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Validates requests and model output against the embedded compliance schema.
///
/// Structure is checked with JSON Schema first, then deserialized with
/// defaults for the optional enrichment fields.
pub struct SchemaValidator {
    request: Validator,
    response: Validator,
    sections: HashMap<Section, Validator>,
    building_info: Validator,
}

impl SchemaValidator {
    pub fn new() -> Result<Self> {
        let full_schema: Value = serde_json::from_str(SCHEMA_JSON)
            .map_err(|e| ComplianceError::SchemaLoad(e.to_string()))?;
        let definitions = &full_schema["definitions"];

        let request = compile(definitions, serde_json::json!({
            "$ref": "#/definitions/complianceRequest"
        }))?;
        let response = compile(definitions, serde_json::json!({
            "$ref": "#/definitions/complianceResponse"
        }))?;
        let building_info = compile(definitions, serde_json::json!({
            "$ref": "#/definitions/buildingInfo"
        }))?;

        let mut sections = HashMap::new();
        for section in Section::SPLIT.iter().copied().chain([Section::Full]) {
            sections.insert(section, compile(definitions, section_root(section))?);
        }

        Ok(Self {
            request,
            response,
            sections,
            building_info,
        })
    }

    /// Validate an untrusted request body.
    ///
    /// `buildingType` wins over the legacy `type` key when both are sent.
    pub fn validate_request(&self, input: &Value) -> std::result::Result<ComplianceRequest, ValidationError> {
        check(&self.request, input)?;

        let building_type = match member(input, "buildingType")? {
            Some(building_type) => Some(building_type),
            None => member(input, "type")?,
        };
        let floors = member::<f64>(input, "floors")?
            .map(|n| {
                whole_floors(n).ok_or_else(|| {
                    ValidationError::single("floors", format!("{n} is not a whole number of floors"))
                })
            })
            .transpose()?;

        Ok(ComplianceRequest {
            description: field(&input["description"], "description")?,
            building_type,
            height: member(input, "height")?,
            floors,
        })
    }

    /// Validate a complete report (all four lists and `buildingInfo`).
    pub fn validate_response(&self, input: &Value) -> std::result::Result<ComplianceResponse, ValidationError> {
        check(&self.response, input)?;

        let mut response = ComplianceResponse {
            building_info: field(&input["buildingInfo"], "buildingInfo")?,
            citations: member(input, "citations")?.unwrap_or_default(),
            ..Default::default()
        };
        for category in Category::ALL {
            let key = category.json_key();
            *response.items_mut(category) = field(&input[key], key)?;
        }
        Ok(response)
    }

    /// Validate only the fields `section` is expected to produce.
    ///
    /// Sibling fields are ignored, except that a well-formed `buildingInfo`
    /// is kept whichever section supplied it.
    pub fn validate_section(
        &self,
        input: &Value,
        section: Section,
    ) -> std::result::Result<PartialReport, ValidationError> {
        let validator = self
            .sections
            .get(&section)
            .ok_or_else(|| ValidationError::single("", format!("no schema for section {section}")))?;
        check(validator, input)?;

        let mut partial = PartialReport::new(section);

        if let Some(info) = input.get("buildingInfo") {
            if section.owns_building_info() {
                partial.building_info = Some(field(info, "buildingInfo")?);
            } else if self.building_info.is_valid(info) {
                partial.building_info = serde_json::from_value::<BuildingInfo>(info.clone()).ok();
            }
        }

        for category in section.categories() {
            let key = category.json_key();
            if let Some(list) = input.get(key) {
                partial.solutions.insert(*category, field(list, key)?);
            }
        }

        if let Some(citations) = input.get("citations") {
            partial.citations = field(citations, "citations")?;
        }

        Ok(partial)
    }
}

fn compile(definitions: &Value, root: Value) -> Result<Validator> {
    // Inline the shared definitions so `$ref`s resolve against this root.
    let mut schema = root;
    schema["$schema"] = Value::String("http://json-schema.org/draft-07/schema#".into());
    schema["definitions"] = definitions.clone();
    Validator::new(&schema)
        .map_err(|e| ComplianceError::SchemaLoad(format!("failed to compile schema: {e}")))
}

fn section_root(section: Section) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    if section.owns_building_info() {
        properties.insert(
            "buildingInfo".into(),
            serde_json::json!({ "$ref": "#/definitions/buildingInfo" }),
        );
        required.push(Value::String("buildingInfo".into()));
    }
    for category in section.categories() {
        properties.insert(
            category.json_key().into(),
            serde_json::json!({ "$ref": "#/definitions/solutionList" }),
        );
        required.push(Value::String(category.json_key().into()));
    }
    properties.insert(
        "citations".into(),
        serde_json::json!({ "$ref": "#/definitions/citationList" }),
    );

    serde_json::json!({
        "type": "object",
        "required": required,
        "properties": properties,
    })
}

fn check(validator: &Validator, input: &Value) -> std::result::Result<(), ValidationError> {
    let mut errors = ValidationError::new();
    for error in validator.iter_errors(input) {
        let message = error.to_string();
        let path = pointer_to_field(&error.instance_path().to_string());
        errors.add(required_field(&path, &message).unwrap_or(path), message);
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn field<T: DeserializeOwned>(value: &Value, name: &str) -> std::result::Result<T, ValidationError> {
    serde_json::from_value(value.clone()).map_err(|e| ValidationError::single(name, e.to_string()))
}

/// Optional top-level member; absent and `null` are both `None`.
fn member<T: DeserializeOwned>(input: &Value, name: &str) -> std::result::Result<Option<T>, ValidationError> {
    match input.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => field(value, name).map(Some),
    }
}

/// `/escapeSolutions/0/content` -> `escapeSolutions.0.content`.
fn pointer_to_field(pointer: &str) -> String {
    pointer
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect::<Vec<_>>()
        .join(".")
}

/// Missing properties are reported on the parent object; key them by the
/// property itself so callers can look up `description` directly.
fn required_field(parent: &str, message: &str) -> Option<String> {
    let name = message
        .strip_suffix(" is a required property")?
        .strip_prefix('"')?
        .strip_suffix('"')?;
    Some(if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}.{name}")
    })
}
