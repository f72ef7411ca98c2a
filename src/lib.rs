//! OpenAPI from docs - OpenAPI 3.0 documents from documentation annotations.
//!
//! This library turns a documentation tree (operations described by URL, verb, parameter and
//! response tags that point at types through crefs) into one or more OpenAPI documents. Types
//! are resolved against an ordered list of modules, either serialized type metadata or Rust
//! sources parsed with `syn`.
//!
//! # Architecture
//!
//! 1. [`doc_tree`] - The documentation tree input
//! 2. [`cref`] - Parses cref strings such as `T:Contracts.Box`1`
//! 3. [`module`] - Loads the modules types are resolved against
//! 4. [`type_resolver`] - Resolves crefs to type handles, including open generics
//! 5. [`schema_generator`] - Builds schemas and the shared reference table
//! 6. [`variant`] - Assigns operations to document variants
//! 7. [`filters`] - Operation and document post-processing
//! 8. [`generator`] - Runs the whole pipeline per operation and variant
//! 9. [`openapi_builder`] - Assembles each variant's document
//! 10. [`diagnostics`] - Collects per-operation and per-document errors
//! 11. [`serializer`] - Writes documents and diagnostics as YAML or JSON
//!
//! # Example Usage
//!
//! ```no_run
//! use openapi_from_docs::{
//!     config::GeneratorConfig,
//!     doc_tree::DocTree,
//!     generator::DocumentGenerator,
//!     module::ModuleContext,
//!     serializer::serialize_yaml,
//!     type_resolver::TypeResolver,
//! };
//! use std::path::{Path, PathBuf};
//!
//! let doc_tree = DocTree::load(Path::new("docs.yaml")).unwrap();
//! let context = ModuleContext::load(&[PathBuf::from("contracts.yaml")]).unwrap();
//!
//! let mut generator = DocumentGenerator::new(GeneratorConfig::default(), TypeResolver::new(context));
//! let output = generator.generate(&doc_tree);
//!
//! for (variant, document) in &output.documents {
//!     println!("# {}\n{}", variant, serialize_yaml(document).unwrap());
//! }
//! println!("status: {:?}", output.diagnostic.overall_status());
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module.

pub mod cli;
pub mod config;
pub mod cref;
pub mod diagnostics;
pub mod doc_tree;
pub mod error;
pub mod filters;
pub mod generator;
pub mod module;
pub mod openapi_builder;
pub mod schema_generator;
pub mod serializer;
pub mod type_resolver;
pub mod variant;
