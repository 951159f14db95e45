//! Ordered form field sets.

/// One named form control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub value: String,
    /// Control dispatches a server action when sent (submit/button/image/reset)
    pub action: bool,
}

/// Ordered name/value mapping harvested from a form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFieldSet {
    fields: Vec<FormField>,
}

impl FormFieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field. Later duplicates replace the earlier value in place.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>, action: bool) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(field) => {
                field.value = value;
                field.action = action;
            }
            None => self.fields.push(FormField {
                name,
                value,
                action,
            }),
        }
    }

    /// Set a value, keeping the field's position if it exists.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(field) => field.value = value,
            None => self.fields.push(FormField {
                name: name.to_string(),
                value,
                action: false,
            }),
        }
    }

    /// Remove a field by name. Returns whether it was present.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.fields.len();
        self.fields.retain(|f| f.name != name);
        self.fields.len() != before
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn retain(&mut self, keep: impl FnMut(&FormField) -> bool) {
        self.fields.retain(keep);
    }

    pub fn iter(&self) -> impl Iterator<Item = &FormField> {
        self.fields.iter()
    }

    /// Fields that would trigger a server action.
    pub fn actions(&self) -> impl Iterator<Item = &FormField> {
        self.fields.iter().filter(|f| f.action)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Name/value pairs in document order, ready for urlencoding.
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.fields
            .iter()
            .map(|f| (f.name.clone(), f.value.clone()))
            .collect()
    }
}
