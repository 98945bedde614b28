//! Vexel Code Generator
//!
//! Builds OpenCL C source for dense-vector kernels from symbolic operation
//! statements and device-tuned template parameters.
//!
//! Pipeline, leaf first:
//!
//! - [`placeholder`]: typed, valueless operands
//! - [`preset`]: one builder per recognized operation
//! - [`variant`]: ahead-of-time enumeration of axpby flag combinations
//! - [`database`]: tuning parameters keyed by device and numeric type
//! - [`generate`]: template expansion of a statement or batch
//! - [`module`]: concatenation of a whole kernel family into one source
//!
//! ```rust
//! use vexel_codegen::database::{DeviceKind, DeviceProfile, TuningDatabase, Vendor};
//! use vexel_codegen::{vector_module, NumericType};
//!
//! let device = DeviceProfile::new(Vendor::Amd, DeviceKind::Gpu, "gfx1030", "rx 6800");
//! let module = vector_module(NumericType::Float, &device, &TuningDatabase::builtin()).unwrap();
//! assert_eq!(module.name, "float_vector");
//! assert_eq!(module.kernel_count(), 48);
//! ```

pub mod database;
pub mod error;
pub mod generate;
pub mod module;
pub mod numeric;
pub mod placeholder;
pub mod preset;
pub mod statement;
pub mod variant;

pub use database::{DeviceProfile, TemplateKind, TemplateParameters, TuningDatabase};
pub use error::CodegenError;
pub use error::Result as CodegenResult;
pub use generate::{expand, BindingPolicy, GeneratedKernel, GeneratorInput};
pub use module::{
    build_module, vector_module, vector_multi_inner_prod_module, GeneratedModule, KernelInfo, ModuleFamily,
};
pub use numeric::{Numeric, NumericType};
pub use placeholder::{Placeholders, Scalar, Vector};
pub use statement::{AssignKind, ScalarFlags, Statement, StatementBatch};
