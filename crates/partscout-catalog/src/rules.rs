//! Category-specific vetoes applied to the best fuzzy match.
//!
//! Fuzzy scores cannot tell a 5600X from a 5600G, or an 8 GB kit from a
//! 16 GB one. These rules reject such pairs outright. A rule only fires when
//! both names carry the attribute it compares.

use std::sync::LazyLock;

use partscout_core::Category;
use regex::Regex;
use serde::Serialize;

use crate::similarity::tokenize;

static CPU_MODEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4,5}[a-z]*").expect("valid cpu model regex"));
static RAM_CAPACITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)gb").expect("valid ram capacity regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum VetoReason {
    CpuModel { scraped: String, catalog: String },
    MemoryType { scraped: String, catalog: String },
    MemoryCapacity { scraped: String, catalog: String },
    GpuTiVariant { scraped_has_ti: bool },
}

impl std::fmt::Display for VetoReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VetoReason::CpuModel { scraped, catalog } => {
                write!(f, "cpu model {scraped} != {catalog}")
            }
            VetoReason::MemoryType { scraped, catalog } => {
                write!(f, "memory type {scraped} != {catalog}")
            }
            VetoReason::MemoryCapacity { scraped, catalog } => {
                write!(f, "capacity {scraped}gb != {catalog}gb")
            }
            VetoReason::GpuTiVariant { scraped_has_ti } => {
                if *scraped_has_ti {
                    f.write_str("scraped name is a Ti variant, catalog entry is not")
                } else {
                    f.write_str("catalog entry is a Ti variant, scraped name is not")
                }
            }
        }
    }
}

/// Checks a scraped name against a catalog name for `category`. `None`
/// means the pair is acceptable.
#[must_use]
pub fn veto(category: Category, scraped: &str, catalog: &str) -> Option<VetoReason> {
    let scraped = scraped.to_lowercase();
    let catalog = catalog.to_lowercase();
    match category {
        Category::Cpu => cpu_veto(&scraped, &catalog),
        Category::Ram => ram_veto(&scraped, &catalog),
        Category::Gpu => gpu_veto(&scraped, &catalog),
        _ => None,
    }
}

fn cpu_veto(scraped: &str, catalog: &str) -> Option<VetoReason> {
    let s = CPU_MODEL_RE.find(scraped)?.as_str();
    let c = CPU_MODEL_RE.find(catalog)?.as_str();
    (s != c).then(|| VetoReason::CpuModel {
        scraped: s.to_owned(),
        catalog: c.to_owned(),
    })
}

fn memory_type(name: &str) -> Option<&'static str> {
    if name.contains("ddr5") {
        Some("ddr5")
    } else if name.contains("ddr4") {
        Some("ddr4")
    } else {
        None
    }
}

fn ram_veto(scraped: &str, catalog: &str) -> Option<VetoReason> {
    if let (Some(s), Some(c)) = (memory_type(scraped), memory_type(catalog)) {
        if s != c {
            return Some(VetoReason::MemoryType {
                scraped: s.to_owned(),
                catalog: c.to_owned(),
            });
        }
    }

    let capacity = |name: &str| {
        RAM_CAPACITY_RE
            .captures(name)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_owned())
    };
    let s = capacity(scraped)?;
    let c = capacity(catalog)?;
    (s != c).then_some(VetoReason::MemoryCapacity {
        scraped: s,
        catalog: c,
    })
}

/// `true` for a standalone `ti` token or a model number glued to it
/// (`3060ti`). Words that merely contain the letters, like "titan", do not
/// count.
fn has_ti(name: &str) -> bool {
    tokenize(name).iter().any(|t| {
        t == "ti"
            || t.strip_suffix("ti")
                .is_some_and(|m| !m.is_empty() && m.chars().all(|c| c.is_ascii_digit()))
    })
}

fn gpu_veto(scraped: &str, catalog: &str) -> Option<VetoReason> {
    let s = has_ti(scraped);
    (s != has_ti(catalog)).then_some(VetoReason::GpuTiVariant { scraped_has_ti: s })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_suffix_mismatch_is_vetoed() {
        let reason = veto(Category::Cpu, "AMD Ryzen 5 5600X", "AMD Ryzen 5 5600G").unwrap();
        assert_eq!(
            reason,
            VetoReason::CpuModel {
                scraped: "5600x".into(),
                catalog: "5600g".into()
            }
        );
    }

    #[test]
    fn cpu_same_model_passes() {
        assert!(
            veto(Category::Cpu, "Intel Core i5-12400F Processor", "Intel Core i5 12400F").is_none()
        );
    }

    #[test]
    fn cpu_without_model_number_passes() {
        assert!(veto(Category::Cpu, "AMD Athlon", "AMD Ryzen 5 5600").is_none());
    }

    #[test]
    fn ram_generation_mismatch_is_vetoed() {
        let reason = veto(
            Category::Ram,
            "Corsair Vengeance 8GB DDR4 3200MHz",
            "Corsair Vengeance 8GB DDR5 5200MHz",
        )
        .unwrap();
        assert!(matches!(reason, VetoReason::MemoryType { .. }));
    }

    #[test]
    fn ram_generation_mismatch_is_vetoed_at_equal_speed() {
        let reason = veto(
            Category::Ram,
            "Corsair Vengeance 8GB DDR5 3200MHz",
            "Corsair Vengeance 8GB DDR4 3200MHz",
        );
        assert_eq!(
            reason,
            Some(VetoReason::MemoryType {
                scraped: "ddr5".into(),
                catalog: "ddr4".into()
            })
        );
    }

    #[test]
    fn ram_capacity_mismatch_is_vetoed() {
        let reason = veto(
            Category::Ram,
            "G.Skill Ripjaws 16GB DDR4",
            "G.Skill Ripjaws 8GB DDR4",
        )
        .unwrap();
        assert_eq!(reason.to_string(), "capacity 16gb != 8gb");
    }

    #[test]
    fn ram_matching_kit_passes() {
        assert!(
            veto(Category::Ram, "TeamGroup 16GB DDR5", "Team Group T-Force 16GB DDR5").is_none()
        );
    }

    #[test]
    fn gpu_ti_on_one_side_is_vetoed() {
        assert!(veto(Category::Gpu, "RTX 3060 Ti", "RTX 3060").is_some());
        assert!(veto(Category::Gpu, "RTX 3060", "MSI RTX 3060Ti Ventus").is_some());
    }

    #[test]
    fn gpu_same_variant_passes() {
        assert!(veto(Category::Gpu, "RTX 3060", "RTX 3060").is_none());
        assert!(veto(Category::Gpu, "ASUS RTX 4070 Ti", "RTX 4070 TI").is_none());
    }

    #[test]
    fn gpu_ti_check_ignores_words_containing_ti() {
        assert!(veto(Category::Gpu, "GTX Titan X", "GTX Titan X").is_none());
        assert!(veto(Category::Gpu, "Gigabyte RTX 4060 Gaming OC Ultimate", "RTX 4060").is_none());
    }

    #[test]
    fn other_categories_accept() {
        assert!(veto(Category::Psu, "Corsair RM750e", "Corsair RM850e").is_none());
    }
}
