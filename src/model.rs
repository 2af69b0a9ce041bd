//! Domain data shared between the caller and the provider core.
//!
//! Everything here is a plain value: lore items are owned by the caller's
//! world state and only read to build context, and generated results are
//! handed back whole. Nothing in this module is shared across concurrent
//! calls.

use serde::{Deserialize, Serialize};

/// Tone label applied to continuations and idea generation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Flavor {
    Mysterious,
    Humorous,
    Dramatic,
    Suspenseful,
    Romantic,
}

impl Flavor {
    /// All selectable flavors, in display order.
    pub const ALL: [Flavor; 5] = [
        Flavor::Mysterious,
        Flavor::Humorous,
        Flavor::Dramatic,
        Flavor::Suspenseful,
        Flavor::Romantic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Flavor::Mysterious => "Mysterious",
            Flavor::Humorous => "Humorous",
            Flavor::Dramatic => "Dramatic",
            Flavor::Suspenseful => "Suspenseful",
            Flavor::Romantic => "Romantic",
        }
    }
}

impl std::fmt::Display for Flavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Continuation length presets, in characters.
pub const LENGTH_OPTIONS: [u32; 3] = [200, 400, 600];

/// An image payload: mime type plus base64-encoded bytes.
///
/// Used both for images attached to lore items (multimodal prompt input)
/// and for generated images returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageData {
    pub mime_type: String,
    pub base64: String,
}

/// The category of a lore item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LoreKind {
    Character,
    Race,
    Faction,
    Location,
    Custom,
}

impl LoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoreKind::Character => "Character",
            LoreKind::Race => "Race",
            LoreKind::Faction => "Faction",
            LoreKind::Location => "Location",
            LoreKind::Custom => "Custom",
        }
    }
}

impl std::fmt::Display for LoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-authored world-building entity.
///
/// Owned by the caller's world state; this core only reads lore items to
/// build prompt context and never mutates one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoreItem {
    pub id: String,
    pub kind: LoreKind,
    pub name: String,
    pub description: String,
    /// Display name of the category when `kind` is [`LoreKind::Custom`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_kind_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageData>,
}

impl LoreItem {
    /// The label used for this item's category in prompts: the custom name
    /// for custom items (with a fallback), the kind name otherwise.
    pub fn kind_label<'a>(&'a self, custom_fallback: &'a str) -> &'a str {
        match self.kind {
            LoreKind::Custom => self
                .custom_kind_name
                .as_deref()
                .filter(|name| !name.is_empty())
                .unwrap_or(custom_fallback),
            other => other.as_str(),
        }
    }
}

/// Which field of a lore item to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoreField {
    Name,
    Description,
}

/// One entry from the OpenAI-compatible model listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub id: String,
    /// Advisory context window size; 0 when the provider did not report one.
    pub context_length: u64,
}

/// Result of importing a character from a character-sheet image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportedCharacter {
    pub name: String,
    pub description: String,
}

/// The literal name the extraction model uses to report an unusable image.
/// Part of the wire contract; the unified client converts it into a
/// classified error so callers never have to compare against it.
pub const IMPORT_FAILED_SENTINEL: &str = "Import Failed";

impl ImportedCharacter {
    /// Whether this result carries the failure sentinel instead of a
    /// real character.
    pub fn is_failure_sentinel(&self) -> bool {
        self.name == IMPORT_FAILED_SENTINEL
    }
}

/// Fast mode fills the core world shape; deep mode additionally requires
/// allies, a rival, and the detailed world-bible sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldMode {
    Fast,
    Deep,
}

/// Overall tone for world generation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WorldTone {
    Grounded,
    Balanced,
    Wild,
}

impl WorldTone {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorldTone::Grounded => "Grounded",
            WorldTone::Balanced => "Balanced",
            WorldTone::Wild => "Wild",
        }
    }
}

/// Fantasy subgenre for deep world generation. Each variant expands to a
/// short gloss in the prompt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Subgenre {
    Low,
    Epic,
    Grimdark,
    Noblebright,
    Weird,
    SliceOfLife,
}

impl Subgenre {
    pub fn gloss(&self) -> &'static str {
        match self {
            Subgenre::Low => "Low: Small-scale struggles, grounded and local.",
            Subgenre::Epic => "Epic: World-shaping conflicts, legendary scope.",
            Subgenre::Grimdark => "Grimdark: Bleak, cynical worlds of brutality.",
            Subgenre::Noblebright => {
                "Noblebright: Hopeful, heroic struggles with moral clarity."
            }
            Subgenre::Weird => "Weird: Uncanny, surreal, or alien atmosphere.",
            Subgenre::SliceOfLife => {
                "Slice of Life: Everyday rhythms, community, and small joys."
            }
        }
    }
}

/// How combat should feel in the generated world.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CombatFeel {
    Messy,
    Technical,
    Brutal,
    Heroic,
}

impl CombatFeel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CombatFeel::Messy => "Messy",
            CombatFeel::Technical => "Technical",
            CombatFeel::Brutal => "Brutal",
            CombatFeel::Heroic => "Heroic",
        }
    }
}

/// Relationship category of a supporting character.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SupportingCharacterCategory {
    Friend,
    Rival,
    Enemy,
    Neutral,
    LoveInterest,
    Family,
    Recurring,
}

impl SupportingCharacterCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupportingCharacterCategory::Friend => "Friend",
            SupportingCharacterCategory::Rival => "Rival",
            SupportingCharacterCategory::Enemy => "Enemy",
            SupportingCharacterCategory::Neutral => "Neutral",
            SupportingCharacterCategory::LoveInterest => "LoveInterest",
            SupportingCharacterCategory::Family => "Family",
            SupportingCharacterCategory::Recurring => "Recurring",
        }
    }
}

/// A supporting-character descriptor for deep world generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportingCharacter {
    pub id: String,
    pub category: SupportingCharacterCategory,
    /// Optional free-text type ("mentor", "smuggler", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Relationship-intensity slider, 0-100. Mapped through per-category
    /// banding into a text label at prompt time.
    pub slider_value: u8,
    pub description: String,
}

/// The full option bag for world generation.
///
/// Absent options are omitted from the prompt entirely rather than rendered
/// as placeholders. Fast mode reads the first block; deep mode reads
/// everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorldGenOptions {
    /// Preset flavor tags. Additive inspiration only; they never override
    /// explicit parameters.
    pub presets: Vec<String>,
    pub tone: Option<WorldTone>,
    pub vibes: Vec<String>,
    /// 0-10, mapped to one of eleven canonical descriptions.
    pub magic_scale: Option<u8>,
    /// 0-10, mapped to one of eleven canonical descriptions.
    pub tech_scale: Option<u8>,
    pub conflict: Option<String>,
    pub setting: Option<String>,
    pub faction_count: Option<u32>,
    pub race_count: Option<u32>,
    pub mc_role: Option<String>,
    pub antagonist_shape: Option<String>,
    pub generate_names: bool,

    // Deep-mode options.
    pub subgenre: Option<Subgenre>,
    pub primary_biome: Option<String>,
    pub travel_constraint: Option<String>,
    pub scarce_resource: Option<String>,
    pub resource_controller: Option<String>,
    pub polity: Option<String>,
    pub justice_style: Option<String>,
    pub taboos: Option<String>,
    pub virtues: Option<String>,
    pub lingua: Option<String>,
    pub religion_presence: Option<String>,
    pub miracle_test: Option<String>,
    pub medicine_type: Option<String>,
    pub medicine_constraint: Option<String>,
    pub tensions: Vec<String>,
    pub mc_scar: Option<String>,
    pub mc_need: Option<String>,
    pub mc_secret: Option<String>,
    pub mc_line: Option<String>,
    pub supporting_characters: Vec<SupportingCharacter>,
    pub antagonist_future: Option<String>,
    pub antagonist_line: Option<String>,
    pub antagonist_doom_clock: Option<String>,
    pub travel_range: Option<String>,
    pub supply_pain: Option<String>,
    pub message_speed: Option<String>,
    pub combat_feel: Option<CombatFeel>,
    pub important_injuries: Option<String>,
    pub visual_anchors: Option<String>,
}

/// A generated faction. The trailing optional fields are only populated in
/// deep mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Faction {
    pub name: String,
    pub goal: String,
    pub method: String,
    pub resource: String,
    pub flaw: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leader_archetype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leverage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fracture_risk: Option<String>,
}

/// A generated race or species.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Race {
    pub name: String,
    pub hallmark: String,
    pub limitation: String,
    pub quirk: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physiology_quirk: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prejudice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gift: Option<String>,
}

/// The generated main character.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MainCharacter {
    pub name: String,
    pub desire: String,
    pub fear: String,
    pub edge: String,
    pub problem: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub need: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_in_sand: Option<String>,
}

/// The generated antagonist.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Antagonist {
    pub name: String,
    pub motive: String,
    pub leverage: String,
    pub weakness: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_future: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_they_wont_cross: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doom_clock: Option<String>,
}

/// A generated ally (deep mode only).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ally {
    pub name: String,
    pub role: String,
    pub edge: String,
}

/// A generated rival (deep mode only).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rival {
    pub name: String,
    pub obsession: String,
    pub blind_spot: String,
}

/// Free-form world-bible sections (deep mode only). Sections the model
/// omitted are empty strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetailedSections {
    #[serde(rename = "macro")]
    pub macro_overview: String,
    pub magic_tech: String,
    pub geography: String,
    pub economy: String,
    pub law_and_order: String,
    pub culture: String,
    pub religion: String,
    pub medicine: String,
    pub conflict_web: String,
    pub logistics: String,
    pub combat: String,
    pub aesthetic: String,
}

/// A complete generated world. Ownership transfers to the caller; this
/// layer keeps no reference after returning it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedWorldData {
    pub world_name: String,
    pub premise: String,
    pub factions: Vec<Faction>,
    pub races: Vec<Race>,
    pub main_character: MainCharacter,
    pub antagonist: Antagonist,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allies: Option<Vec<Ally>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rival: Option<Rival>,
    pub starter_hooks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_sections: Option<DetailedSections>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_label_custom_fallback() {
        let mut item = LoreItem {
            id: "1".to_string(),
            kind: LoreKind::Custom,
            name: "The Veil".to_string(),
            description: String::new(),
            custom_kind_name: None,
            image: None,
        };
        assert_eq!(item.kind_label("lore item"), "lore item");

        item.custom_kind_name = Some("Artifact".to_string());
        assert_eq!(item.kind_label("lore item"), "Artifact");

        item.kind = LoreKind::Faction;
        assert_eq!(item.kind_label("lore item"), "Faction");
    }

    #[test]
    fn test_import_sentinel_detection() {
        let failed = ImportedCharacter {
            name: IMPORT_FAILED_SENTINEL.to_string(),
            description: "Image is unreadable.".to_string(),
        };
        assert!(failed.is_failure_sentinel());

        let ok = ImportedCharacter {
            name: "Kara".to_string(),
            description: "A wandering cartographer.".to_string(),
        };
        assert!(!ok.is_failure_sentinel());
    }

    #[test]
    fn test_world_data_camel_case_wire_shape() {
        let json = serde_json::json!({
            "worldName": "Emberfall",
            "premise": "A city on a dying star.",
            "factions": [],
            "races": [],
            "mainCharacter": {
                "name": "Oro", "desire": "d", "fear": "f", "edge": "e", "problem": "p"
            },
            "antagonist": {
                "name": "Null", "motive": "m", "leverage": "l", "weakness": "w"
            },
            "starterHooks": ["hook"]
        });
        let world: GeneratedWorldData = serde_json::from_value(json).unwrap();
        assert_eq!(world.world_name, "Emberfall");
        assert!(world.allies.is_none());
        assert!(world.detailed_sections.is_none());
    }
}
