// cvar.rs — named configuration variables

use std::collections::HashMap;

use bitflags::bitflags;
use log::{debug, warn};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CvarFlags: u32 {
        /// Written out when the server saves its config.
        const ARCHIVE = 1;
        /// Published in server info queries.
        const SERVERINFO = 4;
        /// Cannot be changed from a config file.
        const NOSET = 8;
        /// Changes are held until the next level load.
        const LATCH = 16;
    }
}

/// A configuration variable.
#[derive(Debug, Clone)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    pub latched_string: Option<String>,
    pub default_string: String,
    pub flags: CvarFlags,
    pub modified: bool,
    pub value: f32,
}

impl Cvar {
    fn assign(&mut self, value: &str) {
        self.string = value.to_string();
        self.value = value.parse::<f32>().unwrap_or(0.0);
        self.modified = true;
    }
}

/// The variable table.
#[derive(Debug, Clone, Default)]
pub struct CvarContext {
    pub cvar_vars: Vec<Cvar>,
    /// name -> index in cvar_vars
    cvar_index: HashMap<String, usize>,
}

impl CvarContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_var(&self, name: &str) -> Option<&Cvar> {
        self.cvar_index.get(name).map(|&idx| &self.cvar_vars[idx])
    }

    pub fn find_var_mut(&mut self, name: &str) -> Option<&mut Cvar> {
        match self.cvar_index.get(name) {
            Some(&idx) => Some(&mut self.cvar_vars[idx]),
            None => None,
        }
    }

    /// Float value of a variable, 0 if it does not exist.
    pub fn variable_value(&self, name: &str) -> f32 {
        self.find_var(name).map_or(0.0, |v| v.value)
    }

    /// String value of a variable, "" if it does not exist.
    pub fn variable_string(&self, name: &str) -> &str {
        self.find_var(name).map_or("", |v| v.string.as_str())
    }

    /// Register a variable. An existing variable keeps its value and gains the
    /// new flags; this is how a config loaded before the game registers its
    /// defaults still wins.
    pub fn get(&mut self, name: &str, default: &str, flags: CvarFlags) -> usize {
        if let Some(&idx) = self.cvar_index.get(name) {
            let var = &mut self.cvar_vars[idx];
            var.flags |= flags;
            var.default_string = default.to_string();
            return idx;
        }

        let idx = self.cvar_vars.len();
        self.cvar_vars.push(Cvar {
            name: name.to_string(),
            string: default.to_string(),
            latched_string: None,
            default_string: default.to_string(),
            flags,
            modified: true,
            value: default.parse::<f32>().unwrap_or(0.0),
        });
        self.cvar_index.insert(name.to_string(), idx);
        idx
    }

    /// Set a variable, honouring NOSET and LATCH.
    pub fn set(&mut self, name: &str, value: &str) -> usize {
        let idx = match self.cvar_index.get(name) {
            Some(&idx) => idx,
            None => return self.get(name, value, CvarFlags::empty()),
        };
        let var = &mut self.cvar_vars[idx];

        if var.flags.contains(CvarFlags::NOSET) {
            warn!("{} is write protected", name);
            return idx;
        }
        if var.flags.contains(CvarFlags::LATCH) {
            if var.string != value {
                debug!("{} will be changed for next level", name);
                var.latched_string = Some(value.to_string());
            }
            return idx;
        }
        if var.string != value {
            var.assign(value);
        }
        idx
    }

    /// Set ignoring NOSET/LATCH.
    pub fn force_set(&mut self, name: &str, value: &str) -> usize {
        let idx = self.get(name, value, CvarFlags::empty());
        let var = &mut self.cvar_vars[idx];
        var.latched_string = None;
        if var.string != value {
            var.assign(value);
        }
        idx
    }

    pub fn set_value(&mut self, name: &str, value: f32) {
        let val_str = if value == (value as i32) as f32 {
            format!("{}", value as i32)
        } else {
            format!("{}", value)
        };
        self.set(name, &val_str);
    }

    /// Apply all latched changes. Called when the game starts.
    pub fn get_latched_vars(&mut self) {
        for var in &mut self.cvar_vars {
            if let Some(latched) = var.latched_string.take() {
                var.assign(&latched);
            }
        }
    }

    /// Apply a pending change to one variable. Returns true if there was one.
    pub fn get_latched_var(&mut self, name: &str) -> bool {
        let Some(&idx) = self.cvar_index.get(name) else {
            return false;
        };
        let var = &mut self.cvar_vars[idx];
        match var.latched_string.take() {
            Some(latched) => {
                var.assign(&latched);
                true
            }
            None => false,
        }
    }

    /// Parse config text: `set <name> <value>` lines (the `set` is optional),
    /// `//` comments and blank lines. Values may be quoted. Returns the number
    /// of variables assigned.
    pub fn exec_text(&mut self, text: &str) -> usize {
        let mut count = 0;
        for (lineno, raw) in text.lines().enumerate() {
            let line = match raw.find("//") {
                Some(pos) => &raw[..pos],
                None => raw,
            }
            .trim();
            if line.is_empty() {
                continue;
            }

            let mut rest = line;
            if let Some(stripped) = rest.strip_prefix("set ") {
                rest = stripped.trim_start();
            }
            let (name, value) = match rest.split_once(char::is_whitespace) {
                Some((n, v)) => (n, v.trim().trim_matches('"')),
                None => {
                    warn!("config line {}: missing value for '{}'", lineno + 1, rest);
                    continue;
                }
            };
            self.set(name, value);
            count += 1;
        }
        count
    }

    /// Archived variables as config text.
    pub fn write_variables(&self) -> String {
        let mut out = String::new();
        for var in self.cvar_vars.iter().filter(|v| v.flags.contains(CvarFlags::ARCHIVE)) {
            out.push_str(&format!("set {} \"{}\"\n", var.name, var.string));
        }
        out
    }

    /// `\key\value` pairs of every SERVERINFO variable.
    pub fn serverinfo(&self) -> String {
        let mut out = String::new();
        for var in self.cvar_vars.iter().filter(|v| v.flags.contains(CvarFlags::SERVERINFO)) {
            out.push('\\');
            out.push_str(&var.name);
            out.push('\\');
            out.push_str(&var.string);
        }
        out
    }
}
