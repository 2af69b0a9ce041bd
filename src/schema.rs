//! Structured-output schemas and response coercion.
//!
//! A [`SchemaObject`] describes the JSON shape an operation expects back.
//! It renders two ways: as a native schema value for the managed backend,
//! and as prompt-embeddable JSON Schema text for OpenAI-compatible
//! endpoints, which only guarantee "some JSON object". Coercion runs on
//! every structured response regardless of transport; native schema
//! adherence is best-effort, not guaranteed.

use nonempty::NonEmpty;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::client::ClientError;
use crate::model::{GeneratedWorldData, ImportedCharacter, WorldMode};

/// The type of a single schema node.
#[derive(Debug, Clone)]
pub enum Schema {
    String,
    Integer,
    Boolean,
    Array(Box<Schema>),
    Object(SchemaObject),
}

#[derive(Debug, Clone)]
struct Property {
    name: &'static str,
    description: Option<&'static str>,
    schema: Schema,
    required: bool,
}

/// An object shape: ordered named properties plus which of them are
/// required.
#[derive(Debug, Clone, Default)]
pub struct SchemaObject {
    properties: Vec<Property>,
}

impl SchemaObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required property.
    pub fn field(mut self, name: &'static str, schema: Schema) -> Self {
        self.properties.push(Property {
            name,
            description: None,
            schema,
            required: true,
        });
        self
    }

    /// Add a required property with a description for the model.
    pub fn field_desc(
        mut self,
        name: &'static str,
        description: &'static str,
        schema: Schema,
    ) -> Self {
        self.properties.push(Property {
            name,
            description: Some(description),
            schema,
            required: true,
        });
        self
    }

    /// Add an optional property.
    pub fn optional(mut self, name: &'static str, schema: Schema) -> Self {
        self.properties.push(Property {
            name,
            description: None,
            schema,
            required: false,
        });
        self
    }

    /// Render as the managed backend's native schema value
    /// (SCREAMING_CASE type tags).
    pub fn to_managed_value(&self) -> Value {
        self.to_value(true)
    }

    /// Render as compact JSON Schema text for embedding into a prompt.
    pub fn to_hint_text(&self) -> String {
        self.to_value(false).to_string()
    }

    fn to_value(&self, managed: bool) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for property in &self.properties {
            let mut value = property.schema.to_value(managed);
            if let (Some(description), Some(object)) = (property.description, value.as_object_mut())
            {
                object.insert("description".to_string(), json!(description));
            }
            properties.insert(property.name.to_string(), value);
            if property.required {
                required.push(Value::from(property.name));
            }
        }

        let type_tag = if managed { "OBJECT" } else { "object" };
        let mut object = Map::new();
        object.insert("type".to_string(), json!(type_tag));
        object.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            object.insert("required".to_string(), Value::Array(required));
        }
        Value::Object(object)
    }
}

impl Schema {
    fn to_value(&self, managed: bool) -> Value {
        let tag = |upper: &'static str, lower: &'static str| if managed { upper } else { lower };
        match self {
            Schema::String => json!({ "type": tag("STRING", "string") }),
            Schema::Integer => json!({ "type": tag("INTEGER", "integer") }),
            Schema::Boolean => json!({ "type": tag("BOOLEAN", "boolean") }),
            Schema::Array(items) => json!({
                "type": tag("ARRAY", "array"),
                "items": items.to_value(managed),
            }),
            Schema::Object(object) => object.to_value(managed),
        }
    }
}

/// Schema for the two-idea brainstorm response.
pub fn ideas_schema() -> SchemaObject {
    SchemaObject::new().field_desc(
        "ideas",
        "An array containing two distinct story continuation ideas.",
        Schema::Array(Box::new(Schema::String)),
    )
}

/// Schema for the character-sheet extraction response.
pub fn character_import_schema() -> SchemaObject {
    SchemaObject::new()
        .field_desc(
            "name",
            "The name of the character. Should be 'Import Failed' if the image is unusable.",
            Schema::String,
        )
        .field_desc(
            "description",
            "A comprehensive description of the character, or an explanation of why the \
             import failed.",
            Schema::String,
        )
}

fn faction_schema(mode: WorldMode) -> SchemaObject {
    let base = SchemaObject::new()
        .field("name", Schema::String)
        .field_desc("goal", "The primary objective of the faction.", Schema::String)
        .field_desc("method", "How they achieve their goal.", Schema::String)
        .field_desc("resource", "A key resource they control.", Schema::String)
        .field_desc("flaw", "A critical weakness or internal conflict.", Schema::String);
    match mode {
        WorldMode::Fast => base,
        WorldMode::Deep => base
            .optional("leaderArchetype", Schema::String)
            .optional("leverage", Schema::String)
            .optional("fractureRisk", Schema::String),
    }
}

fn race_schema(mode: WorldMode) -> SchemaObject {
    let base = SchemaObject::new()
        .field("name", Schema::String)
        .field_desc(
            "hallmark",
            "Their most defining physical or magical trait.",
            Schema::String,
        )
        .field_desc("limitation", "A key weakness or societal constraint.", Schema::String)
        .field_desc("quirk", "A unique cultural habit or belief.", Schema::String);
    match mode {
        WorldMode::Fast => base,
        WorldMode::Deep => base
            .optional("physiologyQuirk", Schema::String)
            .optional("socialRole", Schema::String)
            .optional("prejudice", Schema::String)
            .optional("gift", Schema::String),
    }
}

fn main_character_schema(mode: WorldMode) -> SchemaObject {
    let base = SchemaObject::new()
        .field("name", Schema::String)
        .field_desc("desire", "What the character wants most.", Schema::String)
        .field_desc("fear", "What the character fears most.", Schema::String)
        .field_desc("edge", "A unique skill or advantage they possess.", Schema::String)
        .field_desc("problem", "An immediate, tangible problem they face.", Schema::String);
    match mode {
        WorldMode::Fast => base,
        WorldMode::Deep => base
            .optional("scar", Schema::String)
            .optional("need", Schema::String)
            .optional("secret", Schema::String)
            .optional("lineInSand", Schema::String),
    }
}

fn antagonist_schema(mode: WorldMode) -> SchemaObject {
    let base = SchemaObject::new()
        .field("name", Schema::String)
        .field_desc("motive", "Why they are the antagonist.", Schema::String)
        .field_desc("leverage", "What power or influence they hold.", Schema::String)
        .field_desc("weakness", "A vulnerability that can be exploited.", Schema::String);
    match mode {
        WorldMode::Fast => base,
        WorldMode::Deep => base
            .optional("desiredFuture", Schema::String)
            .optional("lineTheyWontCross", Schema::String)
            .optional("doomClock", Schema::String),
    }
}

/// Schema for a complete generated world. The deep shape is the fast shape
/// plus per-entity enrichment fields, allies, a rival, and the free-form
/// detailed sections.
pub fn world_schema(mode: WorldMode) -> SchemaObject {
    let base = SchemaObject::new()
        .field_desc("worldName", "A creative name for the world.", Schema::String)
        .field_desc("premise", "A 1-2 sentence premise.", Schema::String)
        .field("factions", Schema::Array(Box::new(Schema::Object(faction_schema(mode)))))
        .field("races", Schema::Array(Box::new(Schema::Object(race_schema(mode)))))
        .field("mainCharacter", Schema::Object(main_character_schema(mode)))
        .field("antagonist", Schema::Object(antagonist_schema(mode)))
        .field_desc(
            "starterHooks",
            "Three distinct scene seeds.",
            Schema::Array(Box::new(Schema::String)),
        );

    match mode {
        WorldMode::Fast => base,
        WorldMode::Deep => {
            let ally = SchemaObject::new()
                .field("name", Schema::String)
                .field("role", Schema::String)
                .field("edge", Schema::String);
            let rival = SchemaObject::new()
                .field("name", Schema::String)
                .field("obsession", Schema::String)
                .field("blindSpot", Schema::String);
            let mut sections = SchemaObject::new();
            for name in [
                "macro",
                "magicTech",
                "geography",
                "economy",
                "lawAndOrder",
                "culture",
                "religion",
                "medicine",
                "conflictWeb",
                "logistics",
                "combat",
                "aesthetic",
            ] {
                sections = sections.optional(name, Schema::String);
            }

            base.field("allies", Schema::Array(Box::new(Schema::Object(ally))))
                .field("rival", Schema::Object(rival))
                .field("detailedSections", Schema::Object(sections))
        }
    }
}

/// The degraded result returned when an ideas response cannot be parsed.
pub const IDEAS_FALLBACK: &str =
    "The AI couldn't generate ideas in the expected format. Please try again.";

#[derive(Deserialize)]
struct IdeasPayload {
    ideas: Vec<String>,
}

/// Parse an ideas response. Never fails: malformed or empty output degrades
/// to a single apologetic entry, so callers always get a non-empty,
/// well-typed list.
pub fn coerce_ideas(raw: &str) -> NonEmpty<String> {
    if let Ok(payload) = serde_json::from_str::<IdeasPayload>(raw.trim()) {
        if let Some(ideas) = NonEmpty::from_vec(payload.ideas) {
            return ideas;
        }
    }
    NonEmpty::new(IDEAS_FALLBACK.to_string())
}

/// Parse a character-import response. Unlike ideas, a malformed payload is
/// an error: a half-populated character is worse than an explicit failure.
pub fn coerce_character(raw: &str) -> Result<ImportedCharacter, ClientError> {
    serde_json::from_str(raw.trim()).map_err(|e| {
        ClientError::Contract(format!(
            "character import response did not match the expected shape: {e}"
        ))
    })
}

/// Parse a world-generation response, enforcing the required field set for
/// the requested mode.
pub fn coerce_world(raw: &str, mode: WorldMode) -> Result<GeneratedWorldData, ClientError> {
    let world: GeneratedWorldData = serde_json::from_str(raw.trim()).map_err(|e| {
        ClientError::Contract(format!("world generation response failed validation: {e}"))
    })?;

    if mode == WorldMode::Deep {
        let missing = [
            world.allies.is_none().then_some("allies"),
            world.rival.is_none().then_some("rival"),
            world.detailed_sections.is_none().then_some("detailedSections"),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(ClientError::Contract(format!(
                "world generation response is missing required sections: {}",
                missing.join(", ")
            )));
        }
    }

    Ok(world)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_ideas_well_formed() {
        let ideas = coerce_ideas(r#" {"ideas": ["a", "b"]} "#);
        assert_eq!(ideas.len(), 2);
        assert_eq!(ideas.head, "a");
        assert_eq!(ideas.tail, vec!["b".to_string()]);
    }

    #[test]
    fn test_coerce_ideas_empty_array_falls_back() {
        let ideas = coerce_ideas(r#"{"ideas": []}"#);
        assert_eq!(ideas.len(), 1);
        assert_eq!(ideas.head, IDEAS_FALLBACK);
    }

    #[test]
    fn test_coerce_ideas_malformed_falls_back() {
        for raw in ["not json", "{}", r#"{"ideas": "one"}"#, ""] {
            let ideas = coerce_ideas(raw);
            assert_eq!(ideas.head, IDEAS_FALLBACK);
        }
    }

    #[test]
    fn test_coerce_character() {
        let ok = coerce_character(r#"{"name": "Kara", "description": "Cartographer."}"#).unwrap();
        assert_eq!(ok.name, "Kara");

        let err = coerce_character(r#"{"name": "Kara"}"#);
        assert!(matches!(err, Err(ClientError::Contract(_))));
    }

    #[test]
    fn test_coerce_world_fast() {
        let raw = r#"{
            "worldName": "Emberfall",
            "premise": "p",
            "factions": [{"name": "n", "goal": "g", "method": "m", "resource": "r", "flaw": "f"}],
            "races": [],
            "mainCharacter": {"name": "n", "desire": "d", "fear": "f", "edge": "e", "problem": "p"},
            "antagonist": {"name": "n", "motive": "m", "leverage": "l", "weakness": "w"},
            "starterHooks": ["h1", "h2", "h3"]
        }"#;
        let world = coerce_world(raw, WorldMode::Fast).unwrap();
        assert_eq!(world.factions.len(), 1);

        // The same payload is not enough for deep mode.
        let err = coerce_world(raw, WorldMode::Deep).unwrap_err();
        match err {
            ClientError::Contract(message) => {
                assert!(message.contains("allies"));
                assert!(message.contains("rival"));
                assert!(message.contains("detailedSections"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_coerce_world_missing_required_field() {
        let raw = r#"{"worldName": "Emberfall"}"#;
        assert!(matches!(
            coerce_world(raw, WorldMode::Fast),
            Err(ClientError::Contract(_))
        ));
    }

    #[test]
    fn test_managed_schema_rendering() {
        let value = ideas_schema().to_managed_value();
        assert_eq!(value["type"], "OBJECT");
        assert_eq!(value["properties"]["ideas"]["type"], "ARRAY");
        assert_eq!(value["properties"]["ideas"]["items"]["type"], "STRING");
        assert_eq!(value["required"][0], "ideas");
    }

    #[test]
    fn test_hint_text_rendering() {
        let hint = character_import_schema().to_hint_text();
        assert!(hint.contains("\"type\":\"object\""));
        assert!(hint.contains("\"name\""));
        assert!(hint.contains("\"required\""));
        assert!(!hint.contains("OBJECT"));
    }

    #[test]
    fn test_deep_schema_is_superset_of_fast() {
        let fast = world_schema(WorldMode::Fast).to_managed_value();
        let deep = world_schema(WorldMode::Deep).to_managed_value();

        let fast_properties = fast["properties"].as_object().unwrap();
        let deep_properties = deep["properties"].as_object().unwrap();
        for key in fast_properties.keys() {
            assert!(deep_properties.contains_key(key), "deep schema lost {key}");
        }
        assert!(deep_properties.contains_key("allies"));
        assert!(deep_properties.contains_key("rival"));
        assert!(deep_properties.contains_key("detailedSections"));

        // Enrichment fields exist on deep entities but are not required.
        let faction = &deep_properties["factions"]["items"];
        assert!(faction["properties"].as_object().unwrap().contains_key("leaderArchetype"));
        let required = faction["required"].as_array().unwrap();
        assert!(!required.iter().any(|v| v == "leaderArchetype"));
    }
}
