use nullc_bytecode::Image;

/// One not-yet-linked compilation unit: a compiled image plus the names of
/// the other units it imports from. Names are resolved against the other
/// [`CompiledUnit`]s passed to [`crate::link`] in the same call.
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    pub name: String,
    pub image: Image,
    pub dependencies: Vec<String>,
}

impl CompiledUnit {
    pub fn new(name: impl Into<String>, image: Image) -> Self {
        CompiledUnit {
            name: name.into(),
            image,
            dependencies: Vec::new(),
        }
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }
}
