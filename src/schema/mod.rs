//! # Schemas
//!
//! Runtime validation schemas derived from model metadata.
//!
//! - [`Schema`]: ordered typed fields; validates bodies, binds query strings and projects
//!   entities onto responses.
//! - [`Meta`] and [`SchemaBuilder`]: turn a model's fields into schema fields (exclusion,
//!   requiredness, list fields, operator fields).
//! - [`SchemaFactory`]: the input, output, put, patch, filter, list and delete flavours of a
//!   model, uniquely named through a [`NameRegistry`].
//!
//! ```rust,ignore
//! let factory = SchemaFactory::new(Arc::new(NameRegistry::new()));
//! let input = factory.input_schema(&user, &base_model_schema(), None)?;
//! assert_eq!(input.name(), "UserInputSchema");
//! let payload = input.validate(&json!({"required": "x"}))?;
//! ```

pub mod base;
pub mod factory;
pub mod meta;
pub mod registry;
pub mod synth;
pub mod types;

pub use base::{WrapperSchema, base_model_schema, base_record_schema, paginated_list_schema};
pub use factory::SchemaFactory;
pub use meta::{FieldMethods, FieldSelection, Meta};
pub use registry::NameRegistry;
pub use synth::SchemaBuilder;
pub use types::{FieldDefault, FieldShape, Payload, Schema, SchemaField, SchemaKind};
