//! Built-in components.
//!
//! | role | name | behavior |
//! |---|---|---|
//! | extractor | `json-lines` | one JSON value per non-blank line of `source.file` |
//! | extractor | `text-lines` | one string record per line of `source.file` |
//! | converter | `passthrough` | emits its input unchanged |
//! | converter | `json` | parses string records as JSON |
//! | converter | `filter` | drops records lacking `converter.filter.field` |
//! | converter | `flatten` | one record per element of array `converter.flatten.field` |
//! | writer | `json-lines` | one compact JSON document per line |

mod converters;
mod extractors;
mod writers;

pub use converters::{FilterConverter, FlattenConverter, JsonConverter, PassthroughConverter};
pub use extractors::{JsonLinesExtractor, TextLinesExtractor};
pub use writers::JsonLinesWriter;

use std::path::Path;

use gantry_config::keys;

use crate::registry::ComponentRegistry;

pub(crate) fn register(registry: &mut ComponentRegistry) {
  registry
    .register_extractor("json-lines", |ctx| {
      let source = ctx.properties.require(keys::SOURCE_FILE)?;
      Ok(Box::new(JsonLinesExtractor::open(Path::new(source))?))
    })
    .register_extractor("text-lines", |ctx| {
      let source = ctx.properties.require(keys::SOURCE_FILE)?;
      Ok(Box::new(TextLinesExtractor::open(Path::new(source))?))
    })
    .register_converter("passthrough", |_| Ok(Box::new(PassthroughConverter)))
    .register_converter("json", |_| Ok(Box::new(JsonConverter)))
    .register_converter("filter", |ctx| {
      let field = ctx.properties.require(keys::CONVERTER_FILTER_FIELD)?;
      Ok(Box::new(FilterConverter::new(field)))
    })
    .register_converter("flatten", |ctx| {
      let field = ctx.properties.require(keys::CONVERTER_FLATTEN_FIELD)?;
      Ok(Box::new(FlattenConverter::new(field)))
    })
    .register_writer("json-lines", |ctx| {
      Ok(Box::new(JsonLinesWriter::create(ctx.staging_file)?))
    });
}
