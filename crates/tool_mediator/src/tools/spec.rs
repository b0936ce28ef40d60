use crate::error::{MediatorError, Result};
use llm::ToolDefinition;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Number, Value};
use std::collections::HashSet;
use std::fmt;

/// JSON types a parameter can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    pub fn as_schema_type(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }

    /// Parse a schema type name, accepting the upper case spelling Gemini uses
    pub fn from_schema_type(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "string" => Some(ParamType::String),
            "integer" => Some(ParamType::Integer),
            "number" => Some(ParamType::Number),
            "boolean" => Some(ParamType::Boolean),
            "array" => Some(ParamType::Array),
            "object" => Some(ParamType::Object),
            _ => None,
        }
    }

    /// Convert a model-supplied value to this type
    ///
    /// Models routinely send `2.0` for integers or `"3"` for numbers, so lossless
    /// conversions are accepted. Returns `None` when no such conversion exists.
    pub fn coerce(&self, value: &Value) -> Option<Value> {
        match (self, value) {
            (ParamType::String, Value::String(_)) => Some(value.clone()),
            (ParamType::String, Value::Number(n)) => Some(Value::String(n.to_string())),
            (ParamType::String, Value::Bool(b)) => Some(Value::String(b.to_string())),

            (ParamType::Integer, Value::Number(n)) => {
                if n.is_i64() || n.is_u64() {
                    Some(value.clone())
                } else {
                    n.as_f64().and_then(integral_f64).map(Value::from)
                }
            }
            (ParamType::Integer, Value::String(s)) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(integral_f64))
                    .map(Value::from)
            }

            (ParamType::Number, Value::Number(_)) => Some(value.clone()),
            (ParamType::Number, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),

            (ParamType::Boolean, Value::Bool(_)) => Some(value.clone()),
            (ParamType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },

            (ParamType::Array, Value::Array(_)) => Some(value.clone()),
            (ParamType::Object, Value::Object(_)) => Some(value.clone()),
            _ => None,
        }
    }
}

fn integral_f64(value: f64) -> Option<i64> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_schema_type())
    }
}

/// A single named parameter of an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub param_type: ParamType,
    pub description: String,
    pub required: bool,
    /// Value filled in when an optional parameter is omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Further schema keywords sent with the parameter (`items`, `enum`, `format`, ...)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub keywords: Map<String, Value>,
}

impl ParameterSpec {
    pub fn required(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: true,
            default: None,
            keywords: Map::new(),
        }
    }

    pub fn optional(
        name: impl Into<String>,
        param_type: ParamType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>, value: Value) -> Self {
        self.keywords.insert(keyword.into(), value);
        self
    }
}

/// Declaration of an operation the model may request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique name of the operation
    pub name: String,
    /// What the operation does, shown to the model
    pub description: String,
    /// Parameters in declaration order
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    pub fn param(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Build a spec from a JSON schema object of the form used in function declarations
    ///
    /// ```json
    /// { "type": "object",
    ///   "properties": { "city": { "type": "string", "description": "..." } },
    ///   "required": ["city"] }
    /// ```
    pub fn from_json_schema(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: &Value,
    ) -> Result<Self> {
        let name = name.into();
        let invalid = |reason: String| MediatorError::InvalidSchema(format!("{name}: {reason}"));

        let schema = schema
            .as_object()
            .ok_or_else(|| invalid("parameters must be a JSON object".to_string()))?;

        let required: HashSet<&str> = match schema.get("required") {
            None => HashSet::new(),
            Some(Value::Array(names)) => names
                .iter()
                .map(|n| {
                    n.as_str()
                        .ok_or_else(|| invalid("'required' must list parameter names".to_string()))
                })
                .collect::<Result<_>>()?,
            Some(_) => return Err(invalid("'required' must be an array".to_string())),
        };

        let empty = Map::new();
        let properties = match schema.get("properties") {
            None => &empty,
            Some(Value::Object(properties)) => properties,
            Some(_) => return Err(invalid("'properties' must be an object".to_string())),
        };

        let mut parameters = Vec::with_capacity(properties.len());
        for (param_name, property) in properties {
            let type_name = property
                .get("type")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid(format!("parameter '{param_name}' has no type")))?;
            let param_type = ParamType::from_schema_type(type_name).ok_or_else(|| {
                invalid(format!(
                    "parameter '{param_name}' has unsupported type '{type_name}'"
                ))
            })?;

            let keywords = property
                .as_object()
                .map(|schema| {
                    schema
                        .iter()
                        .filter(|(key, _)| !matches!(key.as_str(), "type" | "description" | "default"))
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect()
                })
                .unwrap_or_default();

            parameters.push(ParameterSpec {
                name: param_name.clone(),
                param_type,
                description: property
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                required: required.contains(param_name.as_str()),
                default: property.get("default").cloned(),
                keywords,
            });
        }

        if let Some(unknown) = required
            .iter()
            .find(|n| !parameters.iter().any(|p| p.name == **n))
        {
            return Err(invalid(format!(
                "required parameter '{unknown}' is not declared"
            )));
        }

        let spec = Self {
            name,
            description: description.into(),
            parameters,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Check the declaration itself is well formed
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(MediatorError::InvalidSchema(
                "operation name must not be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for parameter in &self.parameters {
            if !seen.insert(parameter.name.as_str()) {
                return Err(MediatorError::InvalidSchema(format!(
                    "{}: parameter '{}' declared twice",
                    self.name, parameter.name
                )));
            }
            if parameter.param_type == ParamType::Array && !parameter.keywords.contains_key("items") {
                return Err(MediatorError::InvalidSchema(format!(
                    "{}: array parameter '{}' must declare its items",
                    self.name, parameter.name
                )));
            }
            if let Some(default) = &parameter.default {
                if parameter.param_type.coerce(default).is_none() {
                    return Err(MediatorError::InvalidSchema(format!(
                        "{}: default for '{}' is not a {}",
                        self.name, parameter.name, parameter.param_type
                    )));
                }
            }
        }
        Ok(())
    }

    /// JSON schema of the parameters as sent in function declarations
    pub fn parameters_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| {
                let mut property = Value::Object(p.keywords.clone());
                property["type"] = json!(p.param_type.as_schema_type());
                property["description"] = json!(p.description);
                if let Some(default) = &p.default {
                    property["default"] = default.clone();
                }
                (p.name.clone(), property)
            })
            .collect();

        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    pub fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters_schema(),
        }
    }

    /// Validate model-supplied arguments and bring them into the declared shape
    ///
    /// All missing required parameters are reported together. Omitted optional parameters
    /// receive their default, declared parameters are coerced to their type, and arguments
    /// that are not declared pass through untouched.
    pub fn prepare_arguments(&self, args: &Map<String, Value>) -> Result<Map<String, Value>> {
        let missing: Vec<String> = self
            .parameters
            .iter()
            .filter(|p| p.required && args.get(&p.name).map_or(true, Value::is_null))
            .map(|p| p.name.clone())
            .collect();

        if !missing.is_empty() {
            return Err(MediatorError::MissingArguments {
                operation: self.name.clone(),
                missing,
            });
        }

        let mut prepared = args.clone();
        for parameter in &self.parameters {
            match args.get(&parameter.name) {
                None | Some(Value::Null) => {
                    prepared.remove(&parameter.name);
                    if let Some(default) = &parameter.default {
                        let default = parameter
                            .param_type
                            .coerce(default)
                            .unwrap_or_else(|| default.clone());
                        prepared.insert(parameter.name.clone(), default);
                    }
                }
                Some(value) => {
                    let coerced = parameter.param_type.coerce(value).ok_or_else(|| {
                        MediatorError::InvalidArgument {
                            operation: self.name.clone(),
                            parameter: parameter.name.clone(),
                            expected: parameter.param_type,
                            value: value.clone(),
                        }
                    })?;
                    prepared.insert(parameter.name.clone(), coerced);
                }
            }
        }

        Ok(prepared)
    }
}
