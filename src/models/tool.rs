//! Tool descriptors: the static, schema-described surface of each adapter.

use regex::Regex;
use serde_json::{json, Map, Value};

use super::Query;

/// JSON type of a tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    StringArray,
}

impl ParamType {
    fn schema_type(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::StringArray => "array",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::StringArray => value
                .as_array()
                .map(|items| items.iter().all(Value::is_string))
                .unwrap_or(false),
        }
    }
}

/// Full-match regex for string parameters, compiled once
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        let anchored = format!("^(?:{})$", source.trim_start_matches('^').trim_end_matches('$'));
        Ok(Self {
            source: source.to_string(),
            regex: Regex::new(&anchored)?,
        })
    }

    /// The pattern as declared, used in the JSON Schema
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// Declaration of one tool parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub param_type: ParamType,
    pub description: String,
    pub required: bool,
    pub default: Option<Value>,
    /// Allowed values for string parameters
    pub allowed: Vec<String>,
    /// Regex a string value must match in full
    pub pattern: Option<Pattern>,
    pub minimum: Option<i64>,
    pub maximum: Option<i64>,
    /// Alternative names accepted and rewritten to `name`
    pub aliases: Vec<String>,
}

impl ParamSpec {
    fn new(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            required: false,
            default: None,
            allowed: Vec::new(),
            pattern: None,
            minimum: None,
            maximum: None,
            aliases: Vec::new(),
        }
    }

    pub fn string(name: &str, description: &str) -> Self {
        Self::new(name, ParamType::String, description)
    }

    pub fn integer(name: &str, description: &str) -> Self {
        Self::new(name, ParamType::Integer, description)
    }

    pub fn number(name: &str, description: &str) -> Self {
        Self::new(name, ParamType::Number, description)
    }

    pub fn boolean(name: &str, description: &str) -> Self {
        Self::new(name, ParamType::Boolean, description)
    }

    pub fn string_array(name: &str, description: &str) -> Self {
        Self::new(name, ParamType::StringArray, description)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn one_of(mut self, values: &[&str]) -> Self {
        self.allowed = values.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.pattern = Some(Pattern::new(pattern)?);
        Ok(self)
    }

    pub fn range(mut self, minimum: i64, maximum: i64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    fn schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".into(), json!(self.param_type.schema_type()));
        if self.param_type == ParamType::StringArray {
            schema.insert("items".into(), json!({ "type": "string" }));
        }
        let mut description = self.description.clone();
        if !self.aliases.is_empty() {
            description.push_str(&format!(" (also accepted as: {})", self.aliases.join(", ")));
        }
        schema.insert("description".into(), json!(description));
        if let Some(default) = &self.default {
            schema.insert("default".into(), default.clone());
        }
        if !self.allowed.is_empty() {
            schema.insert("enum".into(), json!(self.allowed));
        }
        if let Some(pattern) = &self.pattern {
            schema.insert("pattern".into(), json!(pattern.as_str()));
        }
        if let Some(min) = self.minimum {
            schema.insert("minimum".into(), json!(min));
        }
        if let Some(max) = self.maximum {
            schema.insert("maximum".into(), json!(max));
        }
        Value::Object(schema)
    }

    fn check(&self, value: &Value) -> Result<(), SchemaViolation> {
        if !self.param_type.matches(value) {
            return Err(SchemaViolation::new(
                &self.name,
                format!(
                    "expected {}, got {}",
                    self.param_type.schema_type(),
                    json_type_name(value)
                ),
            ));
        }

        if let Some(text) = value.as_str() {
            if !self.allowed.is_empty() && !self.allowed.iter().any(|a| a == text) {
                return Err(SchemaViolation::new(
                    &self.name,
                    format!("'{}' is not one of: {}", text, self.allowed.join(", ")),
                ));
            }
            if let Some(pattern) = &self.pattern {
                if !pattern.is_match(text) {
                    return Err(SchemaViolation::new(
                        &self.name,
                        format!("'{}' does not match {}", text, pattern.as_str()),
                    ));
                }
            }
        }

        if let Some(n) = value.as_i64() {
            if self.minimum.is_some_and(|min| n < min) || self.maximum.is_some_and(|max| n > max) {
                return Err(SchemaViolation::new(
                    &self.name,
                    format!(
                        "{} is outside {}..={}",
                        n,
                        self.minimum.unwrap_or(i64::MIN),
                        self.maximum.unwrap_or(i64::MAX)
                    ),
                ));
            }
        } else if value.is_u64() && self.maximum.is_some() {
            // Larger than i64::MAX, so over any declared maximum
            return Err(SchemaViolation::new(&self.name, "value is too large"));
        }

        Ok(())
    }
}

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// The missing or invalid field
    pub field: String,
    pub detail: String,
}

impl SchemaViolation {
    pub fn new(field: &str, detail: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "field '{}': {}", self.field, self.detail)
    }
}

/// Static metadata for one tool: name, description and parameter schema
///
/// Built once when an adapter is constructed and never modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
    /// Groups of parameters of which at least one must be supplied
    pub any_of: Vec<Vec<String>>,
}

impl ToolDescriptor {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            params: Vec::new(),
            any_of: Vec::new(),
        }
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// Require at least one of the named parameters
    pub fn at_least_one_of(mut self, names: &[&str]) -> Self {
        self.any_of
            .push(names.iter().map(|n| n.to_string()).collect());
        self
    }

    /// Look up a parameter by name or alias
    pub fn find_param(&self, key: &str) -> Option<&ParamSpec> {
        self.params
            .iter()
            .find(|p| p.name == key || p.aliases.iter().any(|a| a == key))
    }

    /// Names of the required parameters
    pub fn required(&self) -> Vec<&str> {
        self.params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// JSON Schema for the tool's arguments
    pub fn input_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| (p.name.clone(), p.schema()))
            .collect();

        let mut schema = json!({
            "type": "object",
            "properties": properties,
            "required": self.required(),
            "additionalProperties": false,
        });

        if !self.any_of.is_empty() {
            let groups: Vec<Value> = self
                .any_of
                .iter()
                .map(|group| {
                    json!({
                        "anyOf": group
                            .iter()
                            .map(|name| json!({ "required": [name] }))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            schema["allOf"] = Value::Array(groups);
        }

        schema
    }

    /// Validate raw arguments and return the canonical query
    ///
    /// Aliases are rewritten to their parameter name and declared defaults are
    /// filled in. The first violation found is returned.
    pub fn validate(&self, args: &Value) -> Result<Query, SchemaViolation> {
        let object = match args {
            Value::Object(map) => map,
            Value::Null => &Map::new(),
            other => {
                return Err(SchemaViolation::new(
                    "arguments",
                    format!("expected object, got {}", json_type_name(other)),
                ))
            }
        };

        let mut query = Query::new();
        for (key, value) in object {
            let spec = self
                .find_param(key)
                .ok_or_else(|| SchemaViolation::new(key, "unknown parameter"))?;
            if query.contains(&spec.name) {
                return Err(SchemaViolation::new(
                    &spec.name,
                    format!("supplied more than once (as '{}')", key),
                ));
            }
            if value.is_null() {
                continue;
            }
            spec.check(value)?;
            query.insert(spec.name.clone(), value.clone());
        }

        for spec in &self.params {
            if query.contains(&spec.name) {
                continue;
            }
            if spec.required {
                return Err(SchemaViolation::new(&spec.name, "required parameter is missing"));
            }
            if let Some(default) = &spec.default {
                query.insert(spec.name.clone(), default.clone());
            }
        }

        for group in &self.any_of {
            if !group.iter().any(|name| query.contains(name)) {
                return Err(SchemaViolation::new(
                    &group.join("|"),
                    format!("at least one of {} is required", group.join(", ")),
                ));
            }
        }

        Ok(query)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new("search_pubmed", "Search PubMed")
            .param(
                ParamSpec::string("query", "Search terms")
                    .required()
                    .alias("gene"),
            )
            .param(
                ParamSpec::integer("max_results", "Maximum results")
                    .default_value(10)
                    .range(1, 100),
            )
            .param(ParamSpec::string("sort_by", "Sort").one_of(&["relevance", "date"]))
            .param(
                ParamSpec::string("nct_id", "Trial id")
                    .pattern(r"^NCT\d{8}$")
                    .unwrap(),
            )
            .param(ParamSpec::string_array("phases", "Phases"))
    }

    #[test]
    fn test_missing_required_field_is_named() {
        let err = descriptor().validate(&json!({})).unwrap_err();
        assert_eq!(err.field, "query");
    }

    #[test]
    fn test_null_arguments_treated_as_empty() {
        let err = descriptor().validate(&Value::Null).unwrap_err();
        assert_eq!(err.field, "query");
    }

    #[test]
    fn test_non_object_arguments_rejected() {
        let err = descriptor().validate(&json!("HER2")).unwrap_err();
        assert_eq!(err.field, "arguments");
    }

    #[test]
    fn test_wrong_type_rejected() {
        let err = descriptor()
            .validate(&json!({"query": "HER2", "max_results": "10"}))
            .unwrap_err();
        assert_eq!(err.field, "max_results");
        assert!(err.detail.contains("expected integer"));

        let err = descriptor().validate(&json!({"query": 42})).unwrap_err();
        assert_eq!(err.field, "query");
    }

    #[test]
    fn test_float_is_not_an_integer() {
        let err = descriptor()
            .validate(&json!({"query": "HER2", "max_results": 2.5}))
            .unwrap_err();
        assert_eq!(err.field, "max_results");
    }

    #[test]
    fn test_defaults_filled_and_alias_canonicalized() {
        let query = descriptor().validate(&json!({"gene": "HER2"})).unwrap();

        assert_eq!(query.get_str("query"), Some("HER2"));
        assert!(!query.contains("gene"));
        assert_eq!(query.get("max_results"), Some(&json!(10)));
    }

    #[test]
    fn test_alias_and_name_together_rejected() {
        let err = descriptor()
            .validate(&json!({"gene": "HER2", "query": "ERBB2"}))
            .unwrap_err();
        assert_eq!(err.field, "query");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = descriptor()
            .validate(&json!({"query": "HER2", "journal": "Nature"}))
            .unwrap_err();
        assert_eq!(err.field, "journal");
    }

    #[test]
    fn test_enum_pattern_and_range() {
        let d = descriptor();
        assert_eq!(
            d.validate(&json!({"query": "x", "sort_by": "citations"}))
                .unwrap_err()
                .field,
            "sort_by"
        );
        assert_eq!(
            d.validate(&json!({"query": "x", "nct_id": "NCT123"}))
                .unwrap_err()
                .field,
            "nct_id"
        );
        assert_eq!(
            d.validate(&json!({"query": "x", "max_results": 0}))
                .unwrap_err()
                .field,
            "max_results"
        );
        assert!(d
            .validate(&json!({"query": "x", "nct_id": "NCT01234567", "sort_by": "date"}))
            .is_ok());
    }

    #[test]
    fn test_string_array_items_checked() {
        let d = descriptor();
        assert!(d.validate(&json!({"query": "x", "phases": ["PHASE2"]})).is_ok());
        assert_eq!(
            d.validate(&json!({"query": "x", "phases": ["PHASE2", 3]}))
                .unwrap_err()
                .field,
            "phases"
        );
    }

    #[test]
    fn test_at_least_one_of() {
        let d = ToolDescriptor::new("get_bioactivity", "Activities")
            .param(ParamSpec::string("target_chembl_id", "Target"))
            .param(ParamSpec::string("molecule_chembl_id", "Molecule"))
            .at_least_one_of(&["target_chembl_id", "molecule_chembl_id"]);

        let err = d.validate(&json!({})).unwrap_err();
        assert_eq!(err.field, "target_chembl_id|molecule_chembl_id");
        assert!(d.validate(&json!({"molecule_chembl_id": "CHEMBL25"})).is_ok());
    }

    #[test]
    fn test_input_schema() {
        let schema = descriptor().input_schema();

        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], json!(["query"]));
        assert_eq!(schema["additionalProperties"], false);
        assert_eq!(schema["properties"]["max_results"]["default"], 10);
        assert_eq!(schema["properties"]["max_results"]["maximum"], 100);
        assert_eq!(schema["properties"]["phases"]["items"]["type"], "string");
        assert!(schema["properties"]["query"]["description"]
            .as_str()
            .unwrap()
            .contains("gene"));
    }

    #[test]
    fn test_pattern_is_anchored() {
        let pattern = Pattern::new(r"CHEMBL\d+").unwrap();
        assert!(pattern.is_match("CHEMBL1824"));
        assert!(!pattern.is_match("xCHEMBL1824"));
        assert!(!pattern.is_match("CHEMBL1824 "));
        assert_eq!(pattern.as_str(), r"CHEMBL\d+");
    }

    #[test]
    fn test_invalid_pattern_rejected_when_declared() {
        assert!(ParamSpec::string("id", "Id").pattern("CHEMBL(").is_err());
    }
}
