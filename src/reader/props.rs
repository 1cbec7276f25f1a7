//! Property wire tags and the generic property-block parser.
//!
//! Every node's construction data ends in a property block: a count of
//! regular and extra (custom) properties, then per property a type tag, a
//! name, a platform byte and a tag-dependent value. Host loaders may parse
//! their own blocks; the fallback loader uses this generic parser, which
//! keeps the stream synchronized for every known tag.

use glam::{vec2, Vec2};
use tracing::debug;

use crate::scene::{NodeRef, SpriteFrame};
use crate::util::{Error, Result};

use super::Decoder;

/// Wire tags for property values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropType {
    Position,
    Size,
    Point,
    PointLock,
    ScaleLock,
    Degrees,
    Integer,
    Float,
    FloatVar,
    Check,
    SpriteFrame,
    Texture,
    Byte,
    Color3,
    Color4Var,
    Flip,
    BlendMode,
    FntFile,
    Text,
    FontTtf,
    IntegerLabeled,
    Block,
    Animation,
    CcbFile,
    String,
    BlockControl,
    FloatScale,
    FloatXy,
}

impl PropType {
    /// Map a wire tag to a property type.
    pub fn from_tag(tag: u64) -> Option<Self> {
        match tag {
            0 => Some(Self::Position),
            1 => Some(Self::Size),
            2 => Some(Self::Point),
            3 => Some(Self::PointLock),
            4 => Some(Self::ScaleLock),
            5 => Some(Self::Degrees),
            6 => Some(Self::Integer),
            7 => Some(Self::Float),
            8 => Some(Self::FloatVar),
            9 => Some(Self::Check),
            10 => Some(Self::SpriteFrame),
            11 => Some(Self::Texture),
            12 => Some(Self::Byte),
            13 => Some(Self::Color3),
            14 => Some(Self::Color4Var),
            15 => Some(Self::Flip),
            16 => Some(Self::BlendMode),
            17 => Some(Self::FntFile),
            18 => Some(Self::Text),
            19 => Some(Self::FontTtf),
            20 => Some(Self::IntegerLabeled),
            21 => Some(Self::Block),
            22 => Some(Self::Animation),
            23 => Some(Self::CcbFile),
            24 => Some(Self::String),
            25 => Some(Self::BlockControl),
            26 => Some(Self::FloatScale),
            27 => Some(Self::FloatXy),
            _ => None,
        }
    }
}

/// How a stored position relates to its parent container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PositionUnit {
    RelativeBottomLeft,
    RelativeTopLeft,
    RelativeTopRight,
    RelativeBottomRight,
    Percent,
    MultiplyResolution,
}

impl PositionUnit {
    pub fn from_tag(tag: u64) -> Option<Self> {
        match tag {
            0 => Some(Self::RelativeBottomLeft),
            1 => Some(Self::RelativeTopLeft),
            2 => Some(Self::RelativeTopRight),
            3 => Some(Self::RelativeBottomRight),
            4 => Some(Self::Percent),
            5 => Some(Self::MultiplyResolution),
            _ => None,
        }
    }
}

/// How a stored size relates to its parent container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SizeUnit {
    Absolute,
    Percent,
    RelativeContainer,
    HorizontalPercent,
    VerticalPercent,
    MultiplyResolution,
}

impl SizeUnit {
    pub fn from_tag(tag: u64) -> Option<Self> {
        match tag {
            0 => Some(Self::Absolute),
            1 => Some(Self::Percent),
            2 => Some(Self::RelativeContainer),
            3 => Some(Self::HorizontalPercent),
            4 => Some(Self::VerticalPercent),
            5 => Some(Self::MultiplyResolution),
            _ => None,
        }
    }
}

/// How a stored scale is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleUnit {
    Absolute,
    MultiplyResolution,
}

impl ScaleUnit {
    pub fn from_tag(tag: u64) -> Option<Self> {
        match tag {
            0 => Some(Self::Absolute),
            1 => Some(Self::MultiplyResolution),
            _ => None,
        }
    }
}

/// Platform a property is restricted to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Platform {
    All,
    Ios,
    Mac,
}

impl Platform {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::All),
            1 => Some(Self::Ios),
            2 => Some(Self::Mac),
            _ => None,
        }
    }

    /// Platform-restricted properties are consumed but not applied.
    fn applies(&self) -> bool {
        matches!(self, Self::All)
    }
}

/// Decoded property value handed to node acceptors.
#[derive(Clone)]
pub enum PropertyValue {
    Bool(bool),
    Byte(u8),
    Int(i64),
    Float(f32),
    FloatVar { value: f32, variance: f32 },
    FloatScale { value: f32, unit: ScaleUnit },
    Position { point: Vec2, unit: PositionUnit },
    Size { size: Vec2, unit: SizeUnit },
    Scale { scale: Vec2, unit: ScaleUnit },
    Point(Vec2),
    FloatPair(Vec2),
    Color([u8; 3]),
    ColorVar { color: [f32; 4], variance: [f32; 4] },
    Flip { x: bool, y: bool },
    BlendMode { src: u32, dst: u32 },
    Text(String),
    SpriteFrame(SpriteFrame),
    Animation { file: String, name: String },
    /// Root of a nested document resolved for a `CcbFile` property.
    SubDocument(Option<NodeRef>),
}

/// A property beyond the regular count, left to the host to interpret.
#[derive(Clone)]
pub struct CustomProperty {
    pub name: String,
    pub value: PropertyValue,
}

/// Parse one node's property block, applying regular properties to the node
/// and returning the extra ones as custom properties.
pub fn parse_property_block(
    decoder: &mut Decoder<'_, '_, '_>,
    node: &NodeRef,
    _parent: Option<&NodeRef>,
) -> Result<Vec<CustomProperty>> {
    let regular = decoder.read_uint()? as usize;
    let extra = decoder.read_uint()? as usize;

    let mut custom = Vec::new();
    for index in 0..regular + extra {
        let tag = decoder.read_uint()?;
        let prop_type = PropType::from_tag(tag)
            .ok_or_else(|| Error::invalid(format!("unknown property type tag {tag}")))?;
        let name = decoder.read_cached_string()?;
        let platform_byte = decoder.read_byte()?;
        let platform = Platform::from_byte(platform_byte)
            .ok_or_else(|| Error::invalid(format!("unknown platform byte {platform_byte}")))?;

        let applies = platform.applies();
        let Some(value) = read_property_value(decoder, prop_type, node, applies)? else {
            continue;
        };

        if !applies {
            debug!(name = %name, ?platform, "skipping platform-restricted property");
            continue;
        }
        if index >= regular {
            custom.push(CustomProperty { name, value });
        } else {
            apply_property(node, &name, value);
        }
    }
    Ok(custom)
}

/// Read one tag-dependent value. Block-type properties record or resolve a
/// callback binding and produce no value; when `apply` is false their bytes
/// are still consumed but no binding is recorded.
fn read_property_value(
    decoder: &mut Decoder<'_, '_, '_>,
    prop_type: PropType,
    node: &NodeRef,
    apply: bool,
) -> Result<Option<PropertyValue>> {
    let value = match prop_type {
        PropType::Position => {
            let point = read_vec2(decoder)?;
            let unit = read_unit(decoder, PositionUnit::from_tag, "position")?;
            PropertyValue::Position { point, unit }
        }
        PropType::Size => {
            let size = read_vec2(decoder)?;
            let unit = read_unit(decoder, SizeUnit::from_tag, "size")?;
            PropertyValue::Size { size, unit }
        }
        PropType::Point | PropType::PointLock => PropertyValue::Point(read_vec2(decoder)?),
        PropType::ScaleLock => {
            let scale = read_vec2(decoder)?;
            let unit = read_unit(decoder, ScaleUnit::from_tag, "scale")?;
            PropertyValue::Scale { scale, unit }
        }
        PropType::Degrees | PropType::Float => PropertyValue::Float(decoder.read_float()?),
        PropType::FloatVar => PropertyValue::FloatVar {
            value: decoder.read_float()?,
            variance: decoder.read_float()?,
        },
        PropType::FloatScale => {
            let value = decoder.read_float()?;
            let unit = read_unit(decoder, ScaleUnit::from_tag, "float scale")?;
            PropertyValue::FloatScale { value, unit }
        }
        PropType::FloatXy => PropertyValue::FloatPair(read_vec2(decoder)?),
        PropType::Check => PropertyValue::Bool(decoder.read_bool()?),
        PropType::Byte => PropertyValue::Byte(decoder.read_byte()?),
        PropType::Color3 => PropertyValue::Color([
            decoder.read_byte()?,
            decoder.read_byte()?,
            decoder.read_byte()?,
        ]),
        PropType::Color4Var => {
            let mut color = [0.0f32; 4];
            for channel in &mut color {
                *channel = decoder.read_float()?;
            }
            let mut variance = [0.0f32; 4];
            for channel in &mut variance {
                *channel = decoder.read_float()?;
            }
            PropertyValue::ColorVar { color, variance }
        }
        PropType::Flip => PropertyValue::Flip {
            x: decoder.read_bool()?,
            y: decoder.read_bool()?,
        },
        PropType::BlendMode => PropertyValue::BlendMode {
            src: decoder.read_uint()? as u32,
            dst: decoder.read_uint()? as u32,
        },
        PropType::Integer | PropType::IntegerLabeled => PropertyValue::Int(decoder.read_int()?),
        PropType::Text | PropType::String | PropType::FntFile | PropType::FontTtf
        | PropType::Texture => PropertyValue::Text(decoder.read_cached_string()?),
        PropType::SpriteFrame => PropertyValue::SpriteFrame(decoder.read_sprite_frame()?),
        PropType::Animation => PropertyValue::Animation {
            file: decoder.read_cached_string()?,
            name: decoder.read_cached_string()?,
        },
        PropType::Block => {
            let selector = decoder.read_cached_string()?;
            let target_kind = decoder.read_uint()?;
            if apply {
                decoder.handle_callback_property(node, &selector, target_kind, 0)?;
            }
            return Ok(None);
        }
        PropType::BlockControl => {
            let selector = decoder.read_cached_string()?;
            let target_kind = decoder.read_uint()?;
            let control_events = decoder.read_uint()? as u32;
            if apply {
                decoder.handle_callback_property(node, &selector, target_kind, control_events)?;
            }
            return Ok(None);
        }
        PropType::CcbFile => {
            let path = decoder.read_cached_string()?;
            PropertyValue::SubDocument(decoder.read_embedded_document(&path)?)
        }
    };
    Ok(Some(value))
}

fn read_vec2(decoder: &mut Decoder<'_, '_, '_>) -> Result<Vec2> {
    Ok(vec2(decoder.read_float()?, decoder.read_float()?))
}

fn read_unit<U>(
    decoder: &mut Decoder<'_, '_, '_>,
    from_tag: impl Fn(u64) -> Option<U>,
    what: &str,
) -> Result<U> {
    let tag = decoder.read_uint()?;
    from_tag(tag).ok_or_else(|| Error::invalid(format!("unknown {what} unit tag {tag}")))
}

/// Route an applied property through the node's typed accessors where one
/// exists, and the generic sink otherwise.
fn apply_property(node: &NodeRef, name: &str, value: PropertyValue) {
    let mut node = node.borrow_mut();
    match value {
        PropertyValue::Position { point, .. } if name == "position" => node.set_position(point),
        PropertyValue::Float(degrees) if name == "rotation" => node.set_rotation(degrees),
        PropertyValue::Scale { scale, .. } if name == "scale" => node.set_scale(scale),
        PropertyValue::Bool(visible) if name == "visible" => node.set_visible(visible),
        PropertyValue::Int(tag) if name == "tag" => node.set_tag(tag as i32),
        other => node.set_property(name, other),
    }
}
