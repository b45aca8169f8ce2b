//! Convenience constructors for common datatypes of the core schema

use crate::error::Result;
use crate::node::Node;
use crate::primitive::PrimitiveValue;
use crate::schema::core;
use rust_decimal::Decimal;

crate::declare_choice! {
    /// Alternatives of `Coverage.costToBeneficiary.value[x]`.
    pub enum CostValue {
        Quantity => "Quantity",
        Money => "Money",
    }
}

/// A primitive node of type `type_code` holding `value`.
pub fn primitive(type_code: &str, value: impl Into<PrimitiveValue>) -> Result<Node> {
    core().builder(type_code)?.value(value).build()
}

pub fn string(value: &str) -> Result<Node> {
    primitive("string", value)
}

pub fn code(value: &str) -> Result<Node> {
    primitive("code", value)
}

pub fn id(value: &str) -> Result<Node> {
    primitive("id", value)
}

pub fn uri(value: &str) -> Result<Node> {
    primitive("uri", value)
}

pub fn boolean(value: bool) -> Result<Node> {
    primitive("boolean", value)
}

pub fn integer(value: i32) -> Result<Node> {
    primitive("integer", value)
}

pub fn decimal(value: Decimal) -> Result<Node> {
    primitive("decimal", value)
}

pub fn positive_int(value: u32) -> Result<Node> {
    primitive("positiveInt", value)
}

pub fn date(value: &str) -> Result<Node> {
    primitive("date", value)
}

pub fn date_time(value: &str) -> Result<Node> {
    primitive("dateTime", value)
}

/// `Reference` with a literal `reference`.
pub fn reference(literal: &str) -> Result<Node> {
    core()
        .builder("Reference")?
        .set_value("reference", literal)
        .build()
}

/// `Reference` with a literal and an explicit `type`.
pub fn typed_reference(literal: &str, resource_type: &str) -> Result<Node> {
    core()
        .builder("Reference")?
        .set_value("reference", literal)
        .set_value("type", resource_type)
        .build()
}

pub fn coding(system: &str, code: &str) -> Result<Node> {
    core()
        .builder("Coding")?
        .set_value("system", system)
        .set_value("code", code)
        .build()
}

/// `CodeableConcept` with a single coding.
pub fn codeable_concept(system: &str, code: &str) -> Result<Node> {
    core()
        .builder("CodeableConcept")?
        .add("coding", coding(system, code)?)
        .build()
}

pub fn identifier(system: &str, value: &str) -> Result<Node> {
    core()
        .builder("Identifier")?
        .set_value("system", system)
        .set_value("value", value)
        .build()
}

pub fn period(start: Option<&str>, end: Option<&str>) -> Result<Node> {
    let mut builder = core().builder("Period")?;
    if let Some(start) = start {
        builder = builder.set_value("start", start);
    }
    if let Some(end) = end {
        builder = builder.set_value("end", end);
    }
    builder.build()
}

/// UCUM quantity.
pub fn quantity(value: Decimal, unit: &str) -> Result<Node> {
    core()
        .builder("Quantity")?
        .set("value", decimal(value)?)
        .set_value("unit", unit)
        .set_value("system", "http://unitsofmeasure.org")
        .set_value("code", unit)
        .build()
}

pub fn money(value: Decimal, currency: &str) -> Result<Node> {
    core()
        .builder("Money")?
        .set("value", decimal(value)?)
        .set_value("currency", currency)
        .build()
}

/// Extension with a `value[x]`.
pub fn extension(url: &str, value: Node) -> Result<Node> {
    core()
        .builder("Extension")?
        .set_value("url", url)
        .set("value", value)
        .build()
}
