//! Template parameter resolution
//!
//! Tuned structural parameters for the two template families, keyed by
//! device characteristics and numeric type. The table is read-only once
//! built; [`TuningDatabase::builtin`] ships defaults for `float` and
//! `double`, and [`TuningDatabase::from_json`] loads a replacement table.
//!
//! # Lookup
//!
//! An entry matches a device when each of its key fields (vendor, kind,
//! architecture) is either absent or equal to the device's. Among the
//! matching entries that have parameters for the requested numeric type,
//! the most specific one wins; ties go to the entry listed first.

use crate::error::{CodegenError, Result};
use crate::numeric::NumericType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// How work-items walk the vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchingPolicy {
    /// Work-item `g` touches `g, g + global_size, g + 2*global_size, ...`
    GlobalStrided,
    /// Work-item `g` touches one contiguous chunk.
    GlobalContiguous,
}

/// Parameters of the pointwise ("axpy") template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AxpyParameters {
    pub simd_width: u32,
    pub local_size: u32,
    pub num_groups: u32,
    pub fetching: FetchingPolicy,
}

/// Parameters of the two-stage reduction template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReductionParameters {
    pub simd_width: u32,
    pub local_size: u32,
    pub num_groups: u32,
    pub fetching: FetchingPolicy,
}

fn validate_shape(kind: TemplateKind, simd_width: u32, local_size: u32, num_groups: u32) -> Result<()> {
    if !matches!(simd_width, 1 | 2 | 4 | 8 | 16) {
        return Err(CodegenError::invalid_parameters(format!(
            "{kind}: simd_width {simd_width} is not one of 1, 2, 4, 8, 16"
        )));
    }
    if !local_size.is_power_of_two() || local_size > 1024 {
        return Err(CodegenError::invalid_parameters(format!(
            "{kind}: local_size {local_size} must be a power of two no larger than 1024"
        )));
    }
    if num_groups == 0 {
        return Err(CodegenError::invalid_parameters(format!("{kind}: num_groups must be at least 1")));
    }
    Ok(())
}

impl AxpyParameters {
    pub const fn new(simd_width: u32, local_size: u32, num_groups: u32, fetching: FetchingPolicy) -> Self {
        Self {
            simd_width,
            local_size,
            num_groups,
            fetching,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_shape(TemplateKind::Axpy, self.simd_width, self.local_size, self.num_groups)
    }
}

impl ReductionParameters {
    pub const fn new(simd_width: u32, local_size: u32, num_groups: u32, fetching: FetchingPolicy) -> Self {
        Self {
            simd_width,
            local_size,
            num_groups,
            fetching,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_shape(TemplateKind::Reduction, self.simd_width, self.local_size, self.num_groups)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    Axpy,
    Reduction,
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateKind::Axpy => f.write_str("axpy"),
            TemplateKind::Reduction => f.write_str("reduction"),
        }
    }
}

/// Resolved parameter record for one template kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateParameters {
    Axpy(AxpyParameters),
    Reduction(ReductionParameters),
}

impl TemplateParameters {
    pub fn kind(&self) -> TemplateKind {
        match self {
            TemplateParameters::Axpy(_) => TemplateKind::Axpy,
            TemplateParameters::Reduction(_) => TemplateKind::Reduction,
        }
    }
}

impl From<AxpyParameters> for TemplateParameters {
    fn from(params: AxpyParameters) -> Self {
        TemplateParameters::Axpy(params)
    }
}

impl From<ReductionParameters> for TemplateParameters {
    fn from(params: ReductionParameters) -> Self {
        TemplateParameters::Reduction(params)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    Nvidia,
    Amd,
    Intel,
    Apple,
    Arm,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Gpu,
    Cpu,
    Accelerator,
}

/// Device characteristics that tuning and capability checks depend on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub vendor: Vendor,
    pub kind: DeviceKind,
    pub architecture: String,
    pub name: String,
    /// Extension that enables double precision (`cl_khr_fp64`,
    /// `cl_amd_fp64`), if the device has one.
    pub double_extension: Option<String>,
}

impl DeviceProfile {
    pub fn new(vendor: Vendor, kind: DeviceKind, architecture: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            vendor,
            kind,
            architecture: architecture.into(),
            name: name.into(),
            double_extension: None,
        }
    }

    pub fn with_double_extension(mut self, extension: impl Into<String>) -> Self {
        self.double_extension = Some(extension.into());
        self
    }

    pub fn supports_double_precision(&self) -> bool {
        self.double_extension.is_some()
    }
}

/// Both parameter records for one numeric type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeTuning {
    pub axpy: AxpyParameters,
    pub reduction: ReductionParameters,
}

/// One row of the database: optional device key plus per-type parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuningEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<Vendor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<DeviceKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    pub types: BTreeMap<NumericType, TypeTuning>,
}

impl TuningEntry {
    /// `None` if the entry does not apply to `device`, otherwise the number
    /// of key fields it pins down.
    fn specificity(&self, device: &DeviceProfile) -> Option<usize> {
        let mut score = 0;
        if let Some(vendor) = self.vendor {
            if vendor != device.vendor {
                return None;
            }
            score += 1;
        }
        if let Some(kind) = self.kind {
            if kind != device.kind {
                return None;
            }
            score += 1;
        }
        if let Some(arch) = &self.architecture {
            if !arch.eq_ignore_ascii_case(&device.architecture) {
                return None;
            }
            score += 1;
        }
        Some(score)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuningDatabase {
    entries: Vec<TuningEntry>,
}

impl TuningDatabase {
    /// Build a database from entries, rejecting invalid parameter records.
    pub fn new(entries: Vec<TuningEntry>) -> Result<Self> {
        for entry in &entries {
            for tuning in entry.types.values() {
                tuning.axpy.validate()?;
                tuning.reduction.validate()?;
            }
        }
        Ok(Self { entries })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let raw: TuningDatabase = serde_json::from_str(json)?;
        Self::new(raw.entries)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn entries(&self) -> &[TuningEntry] {
        &self.entries
    }

    /// Tuning defaults for `float` and `double`.
    pub fn builtin() -> Self {
        use FetchingPolicy::{GlobalContiguous, GlobalStrided};

        fn both(axpy: AxpyParameters, reduction: ReductionParameters) -> TypeTuning {
            TypeTuning { axpy, reduction }
        }

        fn row(
            vendor: Option<Vendor>,
            kind: Option<DeviceKind>,
            architecture: Option<&str>,
            float: TypeTuning,
            double: TypeTuning,
        ) -> TuningEntry {
            TuningEntry {
                vendor,
                kind,
                architecture: architecture.map(str::to_string),
                types: BTreeMap::from([(NumericType::Float, float), (NumericType::Double, double)]),
            }
        }

        let generic = both(
            AxpyParameters::new(1, 128, 128, GlobalStrided),
            ReductionParameters::new(1, 128, 128, GlobalStrided),
        );

        Self {
            entries: vec![
                row(None, None, None, generic, generic),
                row(
                    None,
                    Some(DeviceKind::Cpu),
                    None,
                    both(
                        AxpyParameters::new(8, 16, 64, GlobalContiguous),
                        ReductionParameters::new(8, 16, 64, GlobalContiguous),
                    ),
                    both(
                        AxpyParameters::new(4, 16, 64, GlobalContiguous),
                        ReductionParameters::new(4, 16, 64, GlobalContiguous),
                    ),
                ),
                row(
                    Some(Vendor::Nvidia),
                    Some(DeviceKind::Gpu),
                    None,
                    both(
                        AxpyParameters::new(1, 128, 256, GlobalStrided),
                        ReductionParameters::new(1, 256, 64, GlobalStrided),
                    ),
                    both(
                        AxpyParameters::new(1, 128, 256, GlobalStrided),
                        ReductionParameters::new(1, 128, 64, GlobalStrided),
                    ),
                ),
                row(
                    Some(Vendor::Nvidia),
                    Some(DeviceKind::Gpu),
                    Some("ampere"),
                    both(
                        AxpyParameters::new(4, 256, 512, GlobalStrided),
                        ReductionParameters::new(4, 256, 128, GlobalStrided),
                    ),
                    both(
                        AxpyParameters::new(2, 256, 512, GlobalStrided),
                        ReductionParameters::new(2, 256, 128, GlobalStrided),
                    ),
                ),
                row(
                    Some(Vendor::Amd),
                    Some(DeviceKind::Gpu),
                    None,
                    both(
                        AxpyParameters::new(4, 256, 256, GlobalStrided),
                        ReductionParameters::new(1, 256, 128, GlobalStrided),
                    ),
                    both(
                        AxpyParameters::new(2, 256, 256, GlobalStrided),
                        ReductionParameters::new(1, 256, 128, GlobalStrided),
                    ),
                ),
                row(
                    Some(Vendor::Intel),
                    Some(DeviceKind::Gpu),
                    None,
                    both(
                        AxpyParameters::new(4, 64, 128, GlobalStrided),
                        ReductionParameters::new(1, 64, 64, GlobalStrided),
                    ),
                    both(
                        AxpyParameters::new(2, 64, 128, GlobalStrided),
                        ReductionParameters::new(1, 64, 64, GlobalStrided),
                    ),
                ),
            ],
        }
    }

    /// View of the database for one device.
    pub fn for_device<'a>(&'a self, device: &'a DeviceProfile) -> DeviceTuning<'a> {
        DeviceTuning { db: self, device }
    }

    fn lookup(&self, device: &DeviceProfile, numeric: NumericType) -> Option<(usize, &TypeTuning)> {
        let mut best: Option<(usize, usize, &TypeTuning)> = None;
        for (index, entry) in self.entries.iter().enumerate() {
            let Some(score) = entry.specificity(device) else {
                continue;
            };
            let Some(tuning) = entry.types.get(&numeric) else {
                continue;
            };
            if best.is_none_or(|(best_score, _, _)| score > best_score) {
                best = Some((score, index, tuning));
            }
        }
        best.map(|(_, index, tuning)| (index, tuning))
    }
}

impl Default for TuningDatabase {
    fn default() -> Self {
        Self::builtin()
    }
}

/// A [`TuningDatabase`] bound to one device.
#[derive(Debug, Clone, Copy)]
pub struct DeviceTuning<'a> {
    db: &'a TuningDatabase,
    device: &'a DeviceProfile,
}

impl DeviceTuning<'_> {
    /// Resolve the parameter record for `(kind, numeric)`.
    ///
    /// Fails with [`CodegenError::UnsupportedNumericType`] when no entry
    /// applicable to this device covers the type.
    pub fn resolve(&self, kind: TemplateKind, numeric: NumericType) -> Result<TemplateParameters> {
        let (index, tuning) = self
            .db
            .lookup(self.device, numeric)
            .ok_or(CodegenError::UnsupportedNumericType { kind, numeric })?;

        debug!(
            device = %self.device.name,
            %kind,
            %numeric,
            entry = index,
            "resolved template parameters"
        );

        Ok(match kind {
            TemplateKind::Axpy => TemplateParameters::Axpy(tuning.axpy),
            TemplateKind::Reduction => TemplateParameters::Reduction(tuning.reduction),
        })
    }

    pub fn axpy(&self, numeric: NumericType) -> Result<AxpyParameters> {
        match self.resolve(TemplateKind::Axpy, numeric)? {
            TemplateParameters::Axpy(params) => Ok(params),
            TemplateParameters::Reduction(_) => unreachable!("axpy lookup returns axpy parameters"),
        }
    }

    pub fn reduction(&self, numeric: NumericType) -> Result<ReductionParameters> {
        match self.resolve(TemplateKind::Reduction, numeric)? {
            TemplateParameters::Reduction(params) => Ok(params),
            TemplateParameters::Axpy(_) => unreachable!("reduction lookup returns reduction parameters"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gpu(vendor: Vendor, arch: &str) -> DeviceProfile {
        DeviceProfile::new(vendor, DeviceKind::Gpu, arch, "test gpu")
    }

    #[test]
    fn test_builtin_is_valid() {
        let db = TuningDatabase::builtin();
        assert!(TuningDatabase::new(db.entries().to_vec()).is_ok());
    }

    #[test]
    fn test_generic_fallback() {
        let db = TuningDatabase::builtin();
        let device = gpu(Vendor::Apple, "m2");
        let params = db.for_device(&device).axpy(NumericType::Float).unwrap();
        assert_eq!(params, AxpyParameters::new(1, 128, 128, FetchingPolicy::GlobalStrided));
    }

    #[test]
    fn test_most_specific_entry_wins() {
        let db = TuningDatabase::builtin();

        let ampere = gpu(Vendor::Nvidia, "Ampere");
        assert_eq!(db.for_device(&ampere).axpy(NumericType::Float).unwrap().simd_width, 4);

        let turing = gpu(Vendor::Nvidia, "turing");
        assert_eq!(db.for_device(&turing).axpy(NumericType::Float).unwrap().simd_width, 1);
        assert_eq!(db.for_device(&turing).reduction(NumericType::Float).unwrap().local_size, 256);

        let cpu = DeviceProfile::new(Vendor::Intel, DeviceKind::Cpu, "skylake", "test cpu");
        assert_eq!(
            db.for_device(&cpu).reduction(NumericType::Double).unwrap().fetching,
            FetchingPolicy::GlobalContiguous
        );
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let db = TuningDatabase::builtin();
        let device = gpu(Vendor::Amd, "gfx1100");
        let tuning = db.for_device(&device);
        assert_eq!(
            tuning.resolve(TemplateKind::Reduction, NumericType::Double).unwrap(),
            tuning.resolve(TemplateKind::Reduction, NumericType::Double).unwrap()
        );
    }

    #[test]
    fn test_unsupported_type_fails() {
        let db = TuningDatabase::builtin();
        let device = gpu(Vendor::Nvidia, "ampere");
        let err = db
            .for_device(&device)
            .resolve(TemplateKind::Axpy, NumericType::Ushort)
            .unwrap_err();
        assert!(matches!(
            err,
            CodegenError::UnsupportedNumericType {
                kind: TemplateKind::Axpy,
                numeric: NumericType::Ushort
            }
        ));
    }

    #[test]
    fn test_json_round_trip_and_validation() {
        let db = TuningDatabase::builtin();
        let json = db.to_json().unwrap();
        assert_eq!(TuningDatabase::from_json(&json).unwrap(), db);

        let bad = r#"{
            "entries": [{
                "types": {
                    "int": {
                        "axpy": {"simd_width": 3, "local_size": 64, "num_groups": 8, "fetching": "global_strided"},
                        "reduction": {"simd_width": 1, "local_size": 64, "num_groups": 8, "fetching": "global_strided"}
                    }
                }
            }]
        }"#;
        assert!(matches!(
            TuningDatabase::from_json(bad),
            Err(CodegenError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_local_size_must_be_power_of_two() {
        let params = ReductionParameters::new(1, 96, 16, FetchingPolicy::GlobalStrided);
        assert!(params.validate().is_err());
        let params = ReductionParameters::new(1, 2048, 16, FetchingPolicy::GlobalStrided);
        assert!(params.validate().is_err());
    }
}
