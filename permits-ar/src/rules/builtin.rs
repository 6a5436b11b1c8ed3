//! Built-in rule table
//!
//! The categorization table used when no rules file is configured.
//!
//! Per permit type the sub-category rule without a use case comes first and
//! carries no keywords, so a permit whose comments hit none of the specific
//! use cases still lands in the right sub-category (labelled
//! `Uncategorized`). Sign is declared ahead of the Building use cases so a
//! commercial permit mentioning a sign is classified as Sign.

use super::{RuleSet, UseCaseRule};
use permits_common::Result;

/// Static table row
struct Entry {
    category: &'static str,
    sub_category: &'static str,
    use_case: Option<&'static str>,
    permit_types: &'static [&'static str],
    keywords: &'static [&'static str],
    work_types: &'static [&'static str],
}

const CONSTRUCTION: &str = "Construction";
const TRADES: &str = "Trades";
const ENERGY: &str = "Energy";

const BUILDING_TYPES: &[&str] = &["res", "residential", "commercial"];

const ENTRIES: &[Entry] = &[
    // Building
    Entry {
        category: CONSTRUCTION,
        sub_category: "Building",
        use_case: None,
        permit_types: BUILDING_TYPES,
        keywords: &[],
        work_types: &[],
    },
    Entry {
        category: CONSTRUCTION,
        sub_category: "Sign",
        use_case: Some("Sign installation"),
        permit_types: &["commercial"],
        keywords: &["sign", "signage", "billboard"],
        work_types: &[],
    },
    Entry {
        category: CONSTRUCTION,
        sub_category: "Building",
        use_case: Some("Accessory (detached garage, pools, sheds)"),
        permit_types: BUILDING_TYPES,
        keywords: &["garage", "shed", "pool", "accessory", "detached"],
        work_types: &["accessory"],
    },
    Entry {
        category: CONSTRUCTION,
        sub_category: "Building",
        use_case: Some("Addition (Room, story, decks, dormers)"),
        permit_types: BUILDING_TYPES,
        keywords: &["addition", "deck", "dormer", "story", "expand"],
        work_types: &["addition"],
    },
    Entry {
        category: CONSTRUCTION,
        sub_category: "Building",
        use_case: Some("Dwelling Unit Finish"),
        permit_types: BUILDING_TYPES,
        keywords: &["dwelling", "unit finish", "finish basement", "finish attic"],
        work_types: &[],
    },
    Entry {
        category: CONSTRUCTION,
        sub_category: "Building",
        use_case: Some("Flat roof only"),
        permit_types: BUILDING_TYPES,
        keywords: &["flat roof", "tpo", "epdm", "rubber roof", "membrane"],
        work_types: &[],
    },
    Entry {
        category: CONSTRUCTION,
        sub_category: "Building",
        use_case: Some("New Construction"),
        permit_types: BUILDING_TYPES,
        keywords: &["new construction", "new building", "new home", "new sfh", "new sfd"],
        work_types: &["new", "new construction"],
    },
    Entry {
        category: CONSTRUCTION,
        sub_category: "Building",
        use_case: Some("Remodel"),
        permit_types: BUILDING_TYPES,
        keywords: &["remodel", "renovation", "kitchen", "bathroom", "interior"],
        work_types: &["remodel"],
    },
    Entry {
        category: CONSTRUCTION,
        sub_category: "Building",
        use_case: Some("Reroofs (shingle/pitched roof only), Siding, Window Replacements"),
        permit_types: BUILDING_TYPES,
        keywords: &["reroof", "shingle", "siding", "window", "replace window"],
        work_types: &[],
    },
    // Mechanical
    Entry {
        category: TRADES,
        sub_category: "Mechanical",
        use_case: None,
        permit_types: &["mechanical"],
        keywords: &[],
        work_types: &[],
    },
    Entry {
        category: TRADES,
        sub_category: "Mechanical",
        use_case: Some("A/C or Heat pump add on or replacement"),
        permit_types: &["mechanical"],
        keywords: &["air condition", "a/c", " ac ", "heat pump", "cooling", "mini split"],
        work_types: &[],
    },
    Entry {
        category: TRADES,
        sub_category: "Mechanical",
        use_case: Some("Change out furnace (plenum work included)"),
        permit_types: &["mechanical"],
        keywords: &["furnace", "heating unit", "forced air"],
        work_types: &[],
    },
    Entry {
        category: TRADES,
        sub_category: "Mechanical",
        use_case: Some("Change out boiler (incidental piping included)"),
        permit_types: &["mechanical"],
        keywords: &["boiler", "hot water heat", "hydronic"],
        work_types: &[],
    },
    Entry {
        category: TRADES,
        sub_category: "Mechanical",
        use_case: Some("Kitchen vent (CFM)"),
        permit_types: &["mechanical"],
        keywords: &["kitchen vent", "range hood", "exhaust hood", "cfm"],
        work_types: &[],
    },
    Entry {
        category: TRADES,
        sub_category: "Mechanical",
        use_case: Some("Bath fans"),
        permit_types: &["mechanical"],
        keywords: &["bath fan", "bathroom fan", "exhaust fan"],
        work_types: &[],
    },
    Entry {
        category: TRADES,
        sub_category: "Mechanical",
        use_case: Some("Gas piping (include linear feet)"),
        permit_types: &["mechanical"],
        keywords: &["gas line", "gas piping", "gas meter"],
        work_types: &[],
    },
    Entry {
        category: TRADES,
        sub_category: "Mechanical",
        use_case: Some("HRV/ERV"),
        permit_types: &["mechanical"],
        keywords: &["hrv", " erv", "heat recovery", "energy recovery"],
        work_types: &[],
    },
    Entry {
        category: TRADES,
        sub_category: "Mechanical",
        use_case: Some("Dryer vent"),
        permit_types: &["mechanical"],
        keywords: &["dryer vent", "dryer exhaust"],
        work_types: &[],
    },
    // Plumbing
    Entry {
        category: TRADES,
        sub_category: "Plumbing",
        use_case: None,
        permit_types: &["plumbing"],
        keywords: &[],
        work_types: &[],
    },
    Entry {
        category: TRADES,
        sub_category: "Plumbing",
        use_case: Some("Water heater"),
        permit_types: &["plumbing"],
        keywords: &["water heater", "hot water", "tank replacement"],
        work_types: &[],
    },
    Entry {
        category: TRADES,
        sub_category: "Plumbing",
        use_case: Some("Toilet install"),
        permit_types: &["plumbing"],
        keywords: &["toilet", "water closet", "wc"],
        work_types: &[],
    },
    Entry {
        category: TRADES,
        sub_category: "Plumbing",
        use_case: Some("Shower install"),
        permit_types: &["plumbing"],
        keywords: &["shower", "shower valve", "shower install"],
        work_types: &[],
    },
    Entry {
        category: TRADES,
        sub_category: "Plumbing",
        use_case: Some("Bathtub install"),
        permit_types: &["plumbing"],
        keywords: &["bathtub", "tub install", "bath install"],
        work_types: &[],
    },
    Entry {
        category: TRADES,
        sub_category: "Plumbing",
        use_case: Some("Sink - kitchen"),
        permit_types: &["plumbing"],
        keywords: &["kitchen sink", "disposal", "garbage disposal"],
        work_types: &[],
    },
    Entry {
        category: TRADES,
        sub_category: "Plumbing",
        use_case: Some("Dishwasher install"),
        permit_types: &["plumbing"],
        keywords: &["dishwasher"],
        work_types: &[],
    },
    Entry {
        category: TRADES,
        sub_category: "Plumbing",
        use_case: Some("Lavatory - bathroom sink install"),
        permit_types: &["plumbing"],
        keywords: &["lavatory", "bathroom sink", "lav sink"],
        work_types: &[],
    },
    Entry {
        category: TRADES,
        sub_category: "Plumbing",
        use_case: Some("Gas meter"),
        permit_types: &["plumbing"],
        keywords: &["gas meter", "meter move"],
        work_types: &[],
    },
    Entry {
        category: TRADES,
        sub_category: "Plumbing",
        use_case: Some("Backflow device (non-testable)"),
        permit_types: &["plumbing"],
        keywords: &["backflow", "rpz", "backflow preventer"],
        work_types: &[],
    },
    // Single-use-case sub-categories
    Entry {
        category: ENERGY,
        sub_category: "Solar",
        use_case: Some("Solar panels"),
        permit_types: &[],
        keywords: &["solar", "photovoltaic", "pv system", "solar panel", "solar array"],
        work_types: &[],
    },
    Entry {
        category: CONSTRUCTION,
        sub_category: "Wrecking",
        use_case: Some("Demolition"),
        permit_types: &["wrecking"],
        keywords: &["demolition", "wreck", "tear down", "remove building"],
        work_types: &["demolition", "wrecking"],
    },
    Entry {
        category: CONSTRUCTION,
        sub_category: "Soil erosion",
        use_case: None,
        permit_types: &["site"],
        keywords: &[],
        work_types: &[],
    },
    Entry {
        category: CONSTRUCTION,
        sub_category: "Soil erosion",
        use_case: Some("Grading, landscaping, paving, sidewalk, driveway, curb cut"),
        permit_types: &["site"],
        keywords: &[
            "grading",
            "landscaping",
            "paving",
            "sidewalk",
            "driveway",
            "curb cut",
            "erosion control",
        ],
        work_types: &[],
    },
    Entry {
        category: CONSTRUCTION,
        sub_category: "Fence",
        use_case: Some("Fence over 7 feet"),
        permit_types: &[],
        keywords: &["fence", "fencing", "privacy fence"],
        work_types: &["fence"],
    },
    Entry {
        category: CONSTRUCTION,
        sub_category: "Moving",
        use_case: Some("Move Accessory of Utility Structure"),
        permit_types: &["moving"],
        keywords: &["building move", "relocate"],
        work_types: &["move"],
    },
];

/// The built-in rule set
pub fn builtin_rules() -> Result<RuleSet> {
    let rules = ENTRIES
        .iter()
        .map(|e| {
            UseCaseRule::new(
                e.category,
                e.sub_category,
                e.use_case,
                e.permit_types,
                e.keywords,
                e.work_types,
            )
        })
        .collect();
    RuleSet::new(rules, "builtin")
}
