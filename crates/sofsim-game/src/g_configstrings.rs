// g_configstrings.rs — flat indexed string table shared with renderer/audio

use log::warn;
use serde::{Deserialize, Serialize};

use sofsim_common::q_shared::{
    CS_IMAGES, CS_LIGHTS, CS_MODELS, CS_SOUNDS, MAX_CONFIGSTRINGS, MAX_IMAGES, MAX_MODELS,
    MAX_SOUNDS,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigStrings {
    strings: Vec<String>,
}

impl Default for ConfigStrings {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStrings {
    pub fn new() -> Self {
        Self {
            strings: vec![String::new(); MAX_CONFIGSTRINGS],
        }
    }

    pub fn clear(&mut self) {
        for s in &mut self.strings {
            s.clear();
        }
    }

    /// Empty string for unset or out of range indices.
    pub fn get(&self, index: usize) -> &str {
        self.strings.get(index).map_or("", |s| s.as_str())
    }

    /// Out of range writes are dropped.
    pub fn set(&mut self, index: usize, value: &str) {
        match self.strings.get_mut(index) {
            Some(slot) => *slot = value.to_string(),
            None => warn!("configstring: bad index {}", index),
        }
    }

    /// Find `name` in `[start, start + max)` or store it in the first free
    /// slot. Index 0 of every range is reserved, so 0 means "none".
    fn find_index(&mut self, name: &str, start: usize, max: usize) -> usize {
        if name.is_empty() {
            return 0;
        }
        let mut i = 1;
        while i < max {
            let slot = &self.strings[start + i];
            if slot.is_empty() {
                break;
            }
            if slot == name {
                return i;
            }
            i += 1;
        }
        if i == max {
            warn!("configstring: overflow registering '{}'", name);
            return 0;
        }
        self.strings[start + i] = name.to_string();
        i
    }

    pub fn model_index(&mut self, name: &str) -> i32 {
        self.find_index(name, CS_MODELS, MAX_MODELS) as i32
    }

    pub fn sound_index(&mut self, name: &str) -> i32 {
        self.find_index(name, CS_SOUNDS, MAX_SOUNDS) as i32
    }

    pub fn image_index(&mut self, name: &str) -> i32 {
        self.find_index(name, CS_IMAGES, MAX_IMAGES) as i32
    }

    pub fn set_lightstyle(&mut self, style: usize, pattern: &str) {
        self.set(CS_LIGHTS + style, pattern);
    }
}
