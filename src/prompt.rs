//! Prompt construction for every logical operation.
//!
//! Builders turn story text, lore context and generation options into a
//! [`PromptEnvelope`]: system text, user text, and any image parts. The
//! envelope is immutable once built; transports decide how to lay it out on
//! the wire. Optional parameters are only rendered when present, so absent
//! values disappear from the prompt instead of showing up as placeholders.

use itertools::Itertools;

use crate::model::{
    ImageData, LoreField, LoreItem, SupportingCharacterCategory, WorldGenOptions,
};

/// A fully composed prompt, ready for any transport.
///
/// When `image_parts` is non-empty, transports must place the images before
/// the text content part; multimodal models ground noticeably better with
/// the image first.
#[derive(Debug, Clone)]
pub struct PromptEnvelope {
    pub system_text: String,
    pub user_text: String,
    pub image_parts: Vec<ImageData>,
}

impl PromptEnvelope {
    fn text(system_text: String, user_text: String) -> Self {
        Self {
            system_text,
            user_text,
            image_parts: Vec::new(),
        }
    }

    /// System and user text flattened into a single prompt string.
    ///
    /// Used by transports that take one combined prompt, and by callers that
    /// want to estimate token usage before sending anything.
    pub fn flattened_text(&self) -> String {
        if self.system_text.is_empty() {
            return self.user_text.clone();
        }
        format!("{}\n\n{}", self.system_text, self.user_text)
    }
}

const NO_LORE_PLACEHOLDER: &str = "No existing lore provided.";
const NO_STORY_PLACEHOLDER: &str = "No story written yet.";

/// Build the prompt for continuing (or starting) the story.
pub fn continuation(story: &str, context: &str, flavor: &str, length_chars: u32) -> PromptEnvelope {
    let system_text = if story.is_empty() {
        format!(
            "You are a creative storyteller. Your task is to start a new story in a {flavor} \
             tone, taking inspiration from any provided text context. The story opening should \
             be approximately {length_chars} characters long."
        )
    } else {
        format!(
            "You are a creative storyteller. Your task is to continue the story provided below \
             in a {flavor} tone, taking inspiration from any provided text context. The \
             continuation should be approximately {length_chars} characters long. Do not repeat \
             or summarize the story I provide. Only write the next part of the story."
        )
    };

    let story_section = if story.is_empty() {
        "STORY OPENING:".to_string()
    } else {
        format!("STORY SO FAR:\n---\n{story}\n---\n\nCONTINUATION:")
    };

    let context_text = if context.is_empty() {
        "No additional context provided."
    } else {
        context
    };

    let user_text = format!(
        "ADDITIONAL CONTEXT TO CONSIDER:\n---\n{context_text}\n---\n\n{story_section}"
    );

    PromptEnvelope::text(system_text, user_text)
}

/// Build the prompt requesting exactly two continuation (or opener) ideas.
///
/// The JSON shape itself is not described here; transports without native
/// structured output append their own format instruction.
pub fn ideas(story: &str, context: &str, flavor: &str) -> PromptEnvelope {
    let system_text = if story.is_empty() {
        format!(
            "You are a creative writing assistant. Generate exactly two different and \
             compelling ideas for starting a new story, inspired by the context. The tone of \
             the ideas should be {flavor}."
        )
    } else {
        format!(
            "You are a creative writing assistant. Based on the story and context below, \
             generate exactly two different and compelling ideas for what could happen next. \
             The tone of the ideas should be {flavor}."
        )
    };

    let context_text = if context.is_empty() {
        "No additional context provided."
    } else {
        context
    };

    let mut user_text = format!("ADDITIONAL CONTEXT TO CONSIDER:\n---\n{context_text}\n---");
    if !story.is_empty() {
        user_text.push_str(&format!("\n\nSTORY SO FAR:\n---\n{story}\n---"));
    }

    PromptEnvelope::text(system_text, user_text)
}

/// Render lore items into prompt context text.
pub fn format_lore_context(items: &[LoreItem]) -> String {
    if items.is_empty() {
        return NO_LORE_PLACEHOLDER.to_string();
    }

    items
        .iter()
        .map(|item| {
            let header = item.kind_label("Custom").to_uppercase();
            let mut content = format!("Name: {}", item.name.trim());
            if !item.description.trim().is_empty() {
                content.push_str(&format!("\nDescription: {}", item.description.trim()));
            }
            format!("{header}:\n{content}")
        })
        .join("\n\n---\n\n")
}

/// Render the world name, description and lore into one context block.
pub fn format_world_context(
    world_name: &str,
    world_description: &str,
    items: &[LoreItem],
) -> String {
    let mut context = String::new();
    if !world_name.trim().is_empty() {
        context.push_str(&format!("WORLD NAME: {}\n", world_name.trim()));
    }
    if !world_description.trim().is_empty() {
        context.push_str(&format!("WORLD DESCRIPTION: {}\n\n", world_description.trim()));
    }
    if !items.is_empty() {
        context.push_str("LORE ITEMS:\n---\n");
        context.push_str(&format_lore_context(items));
    }

    let context = context.trim();
    if context.is_empty() {
        "No existing world context provided.".to_string()
    } else {
        context.to_string()
    }
}

/// Build the prompt for naming the world. Falls back to a purely random
/// request when there is no story or lore to draw from.
pub fn world_name(story: &str, lore: &[LoreItem]) -> PromptEnvelope {
    let system_text = "You are a creative assistant. When asked for a name, you must respond \
                       with ONLY the generated name in plain text. Do not include any prefixes, \
                       labels (like \"Name:\"), markdown, or quotation marks."
        .to_string();

    let context = format_lore_context(lore);
    let has_context = !story.trim().is_empty() || context != NO_LORE_PLACEHOLDER;

    let user_text = if has_context {
        let story_text = if story.is_empty() { NO_STORY_PLACEHOLDER } else { story };
        format!(
            "Based on the story and lore provided, generate a single, creative, and fitting \
             name for this world.\n\nSTORY SO FAR:\n---\n{story_text}\n---\n\nEXISTING \
             LORE:\n---\n{context}\n---"
        )
    } else {
        "Generate a single, creative, and random name for a fantasy or sci-fi world.".to_string()
    };

    PromptEnvelope::text(system_text, user_text)
}

/// Build the prompt for a short world description.
pub fn world_description(world_name: &str, story: &str, lore: &[LoreItem]) -> PromptEnvelope {
    let system_text = "You are a creative assistant. When asked for a description, you must \
                       respond with ONLY the generated content in plain text. Do not include \
                       any prefixes, labels (like \"Description:\"), markdown, or quotation \
                       marks."
        .to_string();

    let context = format_lore_context(lore);
    let has_context = !story.trim().is_empty() || context != NO_LORE_PLACEHOLDER;
    let name_text = if world_name.is_empty() { "this world" } else { world_name };

    let user_text = if has_context {
        let story_text = if story.is_empty() { NO_STORY_PLACEHOLDER } else { story };
        format!(
            "For a world named \"{name_text}\", write a brief, evocative description (2-3 \
             sentences) based on the story and lore context.\n\nSTORY SO \
             FAR:\n---\n{story_text}\n---\n\nEXISTING LORE:\n---\n{context}\n---"
        )
    } else {
        format!(
            "Write a brief, creative, and random description (2-3 sentences) for a world named \
             \"{name_text}\"."
        )
    };

    PromptEnvelope::text(system_text, user_text)
}

/// Build the prompt for generating one field of a lore item, with the item's
/// image attached when it has one.
pub fn lore_detail(
    story: &str,
    world_name: &str,
    world_description: &str,
    existing: &[LoreItem],
    target: &LoreItem,
    field: LoreField,
) -> PromptEnvelope {
    let system_text = "You are a creative assistant helping a writer build a world for their \
                       story. When asked for a name or description, you must respond with ONLY \
                       the generated content in plain text. Do not include any prefixes, labels \
                       (like \"Name:\"), markdown, or quotation marks."
        .to_string();

    let world_context = format_world_context(world_name, world_description, existing);
    let item_type = target.kind_label("lore item");
    let story_text = if story.is_empty() { NO_STORY_PLACEHOLDER } else { story };

    let user_text = match field {
        LoreField::Name => {
            let description = if target.description.is_empty() {
                "No description yet."
            } else {
                target.description.as_str()
            };
            format!(
                "Based on the story and overall world context (and the provided image, if \
                 any), generate a single, creative, and fitting name for this {item_type}.\nIf \
                 the item already has a description, use that as a strong hint.\n\nSTORY SO \
                 FAR:\n---\n{story_text}\n---\n\nFULL WORLD \
                 CONTEXT:\n---\n{world_context}\n---\n\nCURRENT ITEM \
                 DESCRIPTION:\n---\n{description}\n---"
            )
        }
        LoreField::Description => {
            let name = if target.name.is_empty() { "this item" } else { target.name.as_str() };
            format!(
                "Based on the story, world context, and the provided image (if any), write a \
                 brief, compelling description (1-2 sentences) for the {item_type} named \
                 \"{name}\".\n\nSTORY SO FAR:\n---\n{story_text}\n---\n\nFULL WORLD \
                 CONTEXT:\n---\n{world_context}\n---"
            )
        }
    };

    let mut envelope = PromptEnvelope::text(system_text, user_text);
    if let Some(image) = &target.image {
        envelope.image_parts.push(image.clone());
    }
    envelope
}

/// Build the extraction prompt for importing a character from a
/// character-sheet image.
///
/// The failure contract travels inside the prompt: an unusable image must
/// come back with the literal sentinel name, not an error.
pub fn character_import(image: ImageData) -> PromptEnvelope {
    let system_text = "You are an expert OCR and data extraction AI.".to_string();
    let user_text = format!(
        "Your task is to analyze the provided image of a character sheet (from a TTRPG, video \
         game, or other source) and extract key information.\n\nFrom the image, extract the \
         character's name and create a detailed description. The description should synthesize \
         all available information (appearance, personality, backstory, skills, abilities, \
         inventory) into a cohesive paragraph.\n\nIf the character name is not explicitly \
         found, creatively infer one based on the context. If the image does not appear to be \
         a character sheet or is too blurry to read, the 'name' should be '{}' and the \
         'description' should explain the issue (e.g., 'Image is unreadable or does not \
         contain character data.'). Your response must strictly adhere to the JSON schema.",
        crate::model::IMPORT_FAILED_SENTINEL
    );

    PromptEnvelope {
        system_text,
        user_text,
        image_parts: vec![image],
    }
}

/// Compose the text-to-image prompt for a lore item.
pub fn lore_image(item: &LoreItem, world_name: &str, world_description: &str) -> String {
    let item_type = item.kind_label("concept");
    let name = if item.name.is_empty() { "unnamed" } else { item.name.as_str() };
    let world = if world_name.is_empty() { "unnamed world" } else { world_name };
    let described_as = if world_description.is_empty() {
        "No description provided."
    } else {
        world_description
    };
    let description = if item.description.is_empty() {
        String::new()
    } else {
        format!("{} ", item.description)
    };

    format!(
        "epic fantasy digital painting of a {item_type} named \"{name}\". {description}The \
         scene is set in a world called \"{world}\", which is described as: \"{described_as}\" \
         The image should be a focused, visually compelling representation of the {item_type}."
    )
}

const MAGIC_SCALE_MAP: [&str; 11] = [
    "Null: no magic, only myth/superstition.",
    "Faint Echoes: omens, rare miracles, spirits.",
    "Folk Magic: charms, curses, hedge witches, herbal rites.",
    "Ritual Magic: priests, shamans, ceremonies with repeatable results.",
    "Apprentice Age: structured spellcraft exists, limited and elite.",
    "Mage Orders: guilds, academies, codified disciplines.",
    "Arcane Society: magic entrenched in culture, economy, warfare.",
    "Grand Sorcery: large-scale enchantments, cities shielded, weather shaped.",
    "Mythic Age: gods, avatars, magical creatures openly present.",
    "World-Shaping: reality altered by magic; natural laws pliable.",
    "Transcendent: civilizations operate beyond natural law; existence is magical essence.",
];

const TECH_SCALE_MAP: [&str; 11] = [
    "Stone Age: hunter-gatherers, stone/wood tools, fire.",
    "Bronze Age: early cities, bronze weapons, first writing.",
    "Iron Age: empires, iron/steel, roads, aqueducts.",
    "Medieval: feudal systems, castles, sails, early medicine.",
    "Renaissance: printing, navigation, early science, gunpowder.",
    "Enlightenment / Early Industrial: steam power, factories, long-range navies.",
    "Late Industrial / Victorian: railroads, telegraph, mass production.",
    "Early Modern: cars, planes, electricity, radio.",
    "Modern: computers, nuclear power, space race.",
    "Near Future: AI, biotech, green energy, space colonies.",
    "Far Future: interstellar, post-scarcity, transhuman.",
];

/// The canonical description for a magic level. Values above 10 clamp to
/// the top band.
pub fn magic_scale_label(level: u8) -> &'static str {
    MAGIC_SCALE_MAP[usize::from(level.min(10))]
}

/// The canonical description for a technology level. Values above 10 clamp
/// to the top band.
pub fn tech_scale_label(level: u8) -> &'static str {
    TECH_SCALE_MAP[usize::from(level.min(10))]
}

/// Map a 0-100 relationship-intensity slider to a text label through
/// per-category banding.
pub fn relationship_label(category: SupportingCharacterCategory, value: u8) -> &'static str {
    use SupportingCharacterCategory::*;
    let labels: [&'static str; 5] = match category {
        Friend => [
            "Extremely Loyal",
            "Loyal",
            "Unpredictable",
            "High Betrayal Risk",
            "Almost Certain to Betray",
        ],
        Rival => [
            "Petty Nuisance",
            "Annoying Obstacle",
            "Serious Threat",
            "Dangerous Foe",
            "Deadly Nemesis",
        ],
        Enemy => [
            "Minor Nuisance",
            "Persistent Threat",
            "Dangerous Foe",
            "Lethal Adversary",
            "Existential Threat",
        ],
        Neutral => [
            "Very Helpful",
            "Generally Helpful",
            "Purely Transactional",
            "Potentially Dangerous",
            "Extremely Dangerous",
        ],
        LoveInterest => [
            "Unbreakable Bond",
            "Strong Bond",
            "Complicated Feelings",
            "Significant Obstacles",
            "Seemingly Impossible",
        ],
        Family => [
            "Deeply Supportive",
            "Supportive",
            "Neutral / Strained",
            "Tense / Difficult",
            "Broken / Hostile",
        ],
        Recurring => [
            "Flavor/Background",
            "Minor Importance",
            "Situationally Important",
            "Frequently Important",
            "Critical to the Plot",
        ],
    };

    match value {
        0..=10 => labels[0],
        11..=30 => labels[1],
        31..=70 => labels[2],
        71..=90 => labels[3],
        _ => labels[4],
    }
}

/// Build the fast-mode world generation prompt.
pub fn fast_world(options: &WorldGenOptions) -> PromptEnvelope {
    let vibe_text = if options.vibes.iter().any(|v| v == "None") {
        "a grounded, realistic feel".to_string()
    } else {
        options.vibes.join(", ")
    };

    let mut params = Vec::new();
    if !options.presets.is_empty() {
        params.push(format!("- **Preset Flavors**: {}.", options.presets.join(", ")));
    }
    if let Some(tone) = options.tone {
        params.push(format!("- **Overall Tone**: {}.", tone.as_str()));
    }
    if !options.vibes.is_empty() {
        params.push(format!("- **Vibe Pack**: {vibe_text}."));
    }
    if let Some(level) = options.magic_scale {
        params.push(format!("- **Magic Scale**: {}", magic_scale_label(level)));
    }
    if let Some(level) = options.tech_scale {
        params.push(format!("- **Technology Scale**: {}", tech_scale_label(level)));
    }
    if let Some(conflict) = &options.conflict {
        params.push(format!("- **Core Conflict**: {conflict}."));
    }
    if let Some(setting) = &options.setting {
        params.push(format!("- **Setting Scaffold**: {setting}."));
    }
    if let Some(count) = options.faction_count {
        params.push(format!("- **Number of Factions**: {count}."));
    }
    if let Some(count) = options.race_count {
        params.push(format!("- **Number of Races/Species**: {count}."));
    }
    if let Some(role) = &options.mc_role {
        params.push(format!("- **Main Character (MC) Role**: {role}."));
    }
    if let Some(shape) = &options.antagonist_shape {
        params.push(format!("- **Antagonist Shape**: {shape}."));
    }
    params.push(format!(
        "- **Names**: {}",
        if options.generate_names {
            "Generate creative, fitting names."
        } else {
            "Use descriptive placeholders."
        }
    ));

    let system_text = "You are a master world-builder. Based on the following user-defined \
                       parameters, generate a cohesive and inspiring world concept.\nYour \
                       response MUST be a JSON object that strictly follows the provided \
                       schema. Do not add any extra commentary or text outside the JSON \
                       structure.\nThe \"Preset Flavors\" are optional tags that add \
                       inspiration; they never restrict or overwrite other inputs, and all \
                       combinations are valid."
        .to_string();
    let user_text = format!(
        "Parameters:\n{}\n\nGenerate the world. Be creative and ensure all elements connect \
         logically.",
        params.join("\n")
    );

    PromptEnvelope::text(system_text, user_text)
}

fn tagged(tag: &str, value: Option<&str>) -> Option<String> {
    value.map(|v| format!("{tag} ({v})"))
}

fn push_group(params: &mut Vec<String>, label: &str, parts: Vec<Option<String>>) {
    let parts: Vec<String> = parts.into_iter().flatten().collect();
    if !parts.is_empty() {
        params.push(format!("- {label}: {}", parts.join(", ")));
    }
}

/// Build the deep-mode ("world bible") generation prompt.
pub fn deep_world(options: &WorldGenOptions) -> PromptEnvelope {
    let mut params = Vec::new();

    if !options.presets.is_empty() {
        params.push(format!("- **Preset Flavors**: {}.", options.presets.join(", ")));
    }

    let mut macro_parts = Vec::new();
    if let Some(tone) = options.tone {
        macro_parts.push(format!("Tone: {}", tone.as_str()));
    }
    if let Some(subgenre) = options.subgenre {
        macro_parts.push(format!("Subgenre: {}", subgenre.gloss()));
    }
    if !macro_parts.is_empty() {
        params.push(format!("- {}", macro_parts.join(", ")));
    }

    if let Some(level) = options.magic_scale {
        params.push(format!("- Magic Scale: {}", magic_scale_label(level)));
    }
    if let Some(level) = options.tech_scale {
        params.push(format!("- Technology Scale: {}", tech_scale_label(level)));
    }

    push_group(
        &mut params,
        "Geography",
        vec![
            tagged("Biome", options.primary_biome.as_deref()),
            tagged("Travel Constraint", options.travel_constraint.as_deref()),
        ],
    );
    push_group(
        &mut params,
        "Economy",
        vec![
            tagged("Scarce Resource", options.scarce_resource.as_deref()),
            tagged("Controlled by", options.resource_controller.as_deref()),
        ],
    );
    push_group(
        &mut params,
        "Law",
        vec![
            tagged("Polity", options.polity.as_deref()),
            tagged("Justice", options.justice_style.as_deref()),
        ],
    );
    push_group(
        &mut params,
        "Culture",
        vec![
            tagged("Taboos", options.taboos.as_deref()),
            tagged("Virtues", options.virtues.as_deref()),
            tagged("Lingua", options.lingua.as_deref()),
        ],
    );

    if let Some(count) = options.faction_count {
        params.push(format!("- Factions to generate: {count}"));
    }
    if let Some(count) = options.race_count {
        params.push(format!("- Races to generate: {count}"));
    }

    push_group(
        &mut params,
        "Religion",
        vec![
            tagged("Presence", options.religion_presence.as_deref()),
            tagged("Miracles", options.miracle_test.as_deref()),
        ],
    );
    push_group(
        &mut params,
        "Medicine",
        vec![
            tagged("Type", options.medicine_type.as_deref()),
            tagged("Constraint", options.medicine_constraint.as_deref()),
        ],
    );

    if !options.tensions.is_empty() {
        params.push(format!(
            "- Conflict Web: Tensions are {}",
            options.tensions.join(" and ")
        ));
    }

    push_group(
        &mut params,
        "MC",
        vec![
            tagged("Role", options.mc_role.as_deref()),
            tagged("Scar", options.mc_scar.as_deref()),
            tagged("Need", options.mc_need.as_deref()),
            tagged("Secret", options.mc_secret.as_deref()),
            tagged("Line", options.mc_line.as_deref()),
        ],
    );

    if !options.supporting_characters.is_empty() {
        let descriptions = options
            .supporting_characters
            .iter()
            .map(|character| {
                let dynamic =
                    relationship_label(character.category, character.slider_value);
                let full_text = [
                    character.kind.as_ref().map(|kind| format!("Type: {kind}")),
                    (!character.description.is_empty())
                        .then(|| format!("Description: {}", character.description)),
                    Some(format!("Dynamic: {dynamic}")),
                ]
                .into_iter()
                .flatten()
                .join("; ");
                format!("  - A {} character. {full_text}", character.category.as_str())
            })
            .join("\n");
        params.push(format!("- Supporting Characters:\n{descriptions}"));
    }

    push_group(
        &mut params,
        "Antagonist",
        vec![
            tagged("Shape", options.antagonist_shape.as_deref()),
            tagged("Desired Future", options.antagonist_future.as_deref()),
            tagged("Line they won't cross", options.antagonist_line.as_deref()),
            tagged("Doom Clock", options.antagonist_doom_clock.as_deref()),
        ],
    );
    push_group(
        &mut params,
        "Logistics",
        vec![
            tagged("Travel Range", options.travel_range.as_deref()),
            tagged("Supply Pain", options.supply_pain.as_deref()),
            tagged("Message Speed", options.message_speed.as_deref()),
        ],
    );
    push_group(
        &mut params,
        "Combat",
        vec![
            tagged("Feel", options.combat_feel.map(|feel| feel.as_str())),
            tagged("Important Injuries", options.important_injuries.as_deref()),
        ],
    );

    if let Some(anchors) = &options.visual_anchors {
        params.push(format!("- Aesthetic: Visual Anchors ({anchors})"));
    }

    params.push(format!(
        "- Names: {}",
        if options.generate_names {
            "Generate creative names."
        } else {
            "Use descriptive placeholders."
        }
    ));

    let system_text = "You are a master world-builder creating a \"world bible\". Your \
                       response MUST be a JSON object that strictly follows the provided \
                       schema. Each 'detailedSections' value must be a single string with \
                       distinct points separated by newlines. Do not add extra commentary \
                       outside the JSON.\nThe \"Preset Flavors\" are optional tags that add \
                       inspiration; they never restrict or overwrite other inputs, and all \
                       combinations are valid."
        .to_string();
    let user_text = format!(
        "Parameters:\n{}\n\nNow, generate the detailed world bible.",
        params.join("\n")
    );

    PromptEnvelope::text(system_text, user_text)
}
