use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Reserved literal standing in for "any other value" in expanded conditions.
pub const CONDITIONS_ELSE_VALUE: &str = "__other__";

/// Wires one output of the source task to one input of the target task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataMapping {
    /// `None` passes the complete output map of the source as one value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_output: Option<String>,
    pub target_input: String,
}

impl DataMapping {
    pub fn new(source_output: impl Into<String>, target_input: impl Into<String>) -> Self {
        Self {
            source_output: Some(source_output.into()),
            target_input: target_input.into(),
        }
    }
}

/// Value a condition compares an output against.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    Value(Value),
    /// Matches whatever the sibling branches don't.
    Else,
}

impl ConditionValue {
    /// Values that a branch must hold for the same variable to be considered
    /// the complement of this one. `None` means that any value will do.
    pub(crate) fn complements(&self) -> Option<Vec<ConditionValue>> {
        match self {
            ConditionValue::Else => None,
            ConditionValue::Value(Value::Bool(flag)) => Some(vec![
                ConditionValue::Value(Value::Bool(!flag)),
                ConditionValue::Else,
            ]),
            ConditionValue::Value(_) => Some(vec![ConditionValue::Else]),
        }
    }
}

impl From<Value> for ConditionValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(ref s) if s == CONDITIONS_ELSE_VALUE => ConditionValue::Else,
            value => ConditionValue::Value(value),
        }
    }
}

impl From<bool> for ConditionValue {
    fn from(value: bool) -> Self {
        ConditionValue::Value(Value::Bool(value))
    }
}

impl Serialize for ConditionValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ConditionValue::Value(value) => value.serialize(serializer),
            ConditionValue::Else => serializer.serialize_str(CONDITIONS_ELSE_VALUE),
        }
    }
}

impl<'de> Deserialize<'de> for ConditionValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(ConditionValue::from)
    }
}

/// The link is only followed when `source_output` equals `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub source_output: String,
    pub value: ConditionValue,
}

impl Condition {
    pub fn new(source_output: impl Into<String>, value: impl Into<ConditionValue>) -> Self {
        Self {
            source_output: source_output.into(),
            value: value.into(),
        }
    }
}

/// Attributes of a directed link between two tasks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkAttrs {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_mapping: Vec<DataMapping>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub on_error: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub map_all_data: bool,
    /// Attributes the engine doesn't interpret, kept for dumping.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl LinkAttrs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(
        mut self,
        source_output: impl Into<String>,
        target_input: impl Into<String>,
    ) -> Self {
        self.data_mapping
            .push(DataMapping::new(source_output, target_input));
        self
    }

    pub fn map_all(mut self) -> Self {
        self.map_all_data = true;
        self
    }

    pub fn when(
        mut self,
        source_output: impl Into<String>,
        value: impl Into<ConditionValue>,
    ) -> Self {
        self.conditions.push(Condition::new(source_output, value));
        self
    }

    pub fn on_error(mut self) -> Self {
        self.on_error = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn has_conditions(&self) -> bool {
        !self.conditions.is_empty()
    }

    /// Conditional links are only followed on a matching value or on error.
    pub fn is_conditional(&self) -> bool {
        self.on_error || self.has_conditions()
    }

    /// Merge the attributes of a parallel link into this one.
    ///
    /// Lists are concatenated and flags are OR-ed, so a parallel link with
    /// `required: false` doesn't clear `required` set by another one. Extra
    /// attributes of `other` replace those of the same name.
    pub(crate) fn merge(&mut self, other: LinkAttrs) {
        self.data_mapping.extend(other.data_mapping);
        self.conditions.extend(other.conditions);
        self.on_error |= other.on_error;
        self.required |= other.required;
        self.map_all_data |= other.map_all_data;
        self.extra.extend(other.extra);
    }

    /// Pairs of attributes that the link sets although they exclude each
    /// other.
    pub(crate) fn conflicts(&self) -> Option<(&'static str, &'static str)> {
        if self.map_all_data && !self.data_mapping.is_empty() {
            return Some(("map_all_data", "data_mapping"));
        }
        if self.on_error && self.has_conditions() {
            return Some(("on_error", "conditions"));
        }
        None
    }
}
