//! Persona registry
//!
//! Personas attach a name, role, and style to `ci_*` step prompt rewrapping
//! (spec.md §3). Kept deliberately data-only: no provider wiring lives
//! here, only the record shape and a lookup table loaded alongside
//! workflow templates.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub role: String,
    pub style: String,
    #[serde(default)]
    pub greeting: Option<String>,
}

#[derive(Debug, Default)]
pub struct PersonaRegistry {
    personas: HashMap<String, Persona>,
}

impl PersonaRegistry {
    pub fn new() -> Self {
        Self {
            personas: HashMap::new(),
        }
    }

    pub fn from_json(data: &str) -> crate::error::Result<Self> {
        let list: Vec<Persona> = serde_json::from_str(data)?;
        let mut personas = HashMap::new();
        for p in list {
            personas.insert(p.name.clone(), p);
        }
        Ok(Self { personas })
    }

    pub fn insert(&mut self, persona: Persona) {
        self.personas.insert(persona.name.clone(), persona);
    }

    pub fn get(&self, name: &str) -> Option<&Persona> {
        self.personas.get(name)
    }

    /// Build the spec's rewrap template for a given persona and prompt,
    /// falling back to the bare prompt when the persona is unknown.
    pub fn rewrap(&self, persona_name: Option<&str>, prompt: &str) -> String {
        match persona_name.and_then(|n| self.get(n)) {
            Some(p) => format!(
                "You are {}, a {}. Your style is {}. Present this question naturally: {}",
                p.name, p.role, p.style, prompt
            ),
            None => prompt.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_from_json() {
        let json = r#"[
            {"name": "reviewer", "role": "senior engineer", "style": "blunt"},
            {"name": "writer", "role": "technical writer", "style": "concise", "greeting": "Hi there"}
        ]"#;
        let reg = PersonaRegistry::from_json(json).unwrap();
        assert_eq!(reg.get("reviewer").unwrap().role, "senior engineer");
        assert_eq!(reg.get("writer").unwrap().greeting.as_deref(), Some("Hi there"));
        assert!(reg.get("missing").is_none());
    }

    #[test]
    fn test_insert_overwrites_by_name() {
        let mut reg = PersonaRegistry::new();
        reg.insert(Persona {
            name: "a".into(),
            role: "first".into(),
            style: "terse".into(),
            greeting: None,
        });
        reg.insert(Persona {
            name: "a".into(),
            role: "second".into(),
            style: "terse".into(),
            greeting: None,
        });
        assert_eq!(reg.get("a").unwrap().role, "second");
    }

    #[test]
    fn test_rewrap_uses_exact_template() {
        let mut reg = PersonaRegistry::new();
        reg.insert(Persona {
            name: "scout".into(),
            role: "release manager".into(),
            style: "calm".into(),
            greeting: None,
        });
        let wrapped = reg.rewrap(Some("scout"), "ready to deploy?");
        assert_eq!(
            wrapped,
            "You are scout, a release manager. Your style is calm. Present this question naturally: ready to deploy?"
        );
    }

    #[test]
    fn test_rewrap_falls_back_to_bare_prompt_when_unknown() {
        let reg = PersonaRegistry::new();
        assert_eq!(reg.rewrap(Some("ghost"), "hello?"), "hello?");
        assert_eq!(reg.rewrap(None, "hello?"), "hello?");
    }
}
