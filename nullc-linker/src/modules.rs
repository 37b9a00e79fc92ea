use nullc_bytecode::{ModuleEntry, NO_SOURCE};

/// Accumulates the merged module table and the per-unit remaps it hands
/// back: a `module_remap` (old module index to new) the caller threads
/// into type/function `defining_module` remapping and into the global
/// operand rewrite pass.
#[derive(Default)]
pub struct ModuleTableBuilder {
    pub modules: Vec<ModuleEntry>,
}

impl ModuleTableBuilder {
    /// Merges one unit's module table, shifting each entry's function
    /// range, global-segment base, and source span into the merged
    /// image's coordinate spaces. Returns the unit's module_remap.
    pub fn merge_unit(
        &mut self,
        unit_modules: &[ModuleEntry],
        symbol_shift: u32,
        function_base: u32,
        global_segment_base: u32,
        source_shift: u32,
    ) -> Vec<u32> {
        let module_base = self.modules.len() as u32;
        for m in unit_modules {
            self.modules.push(ModuleEntry {
                name_offset: m.name_offset + symbol_shift,
                first_function_index: m.first_function_index + function_base,
                global_variable_base_offset: m.global_variable_base_offset + global_segment_base,
                source_offset: if m.has_source() { m.source_offset + source_shift } else { NO_SOURCE },
                ..*m
            });
        }
        (0..unit_modules.len() as u32).map(|old| module_base + old).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(name_offset: u32, first_function_index: u32, function_count: u32, global_base: u32) -> ModuleEntry {
        ModuleEntry {
            name_offset,
            name_hash: 0,
            first_function_index,
            function_count,
            global_variable_base_offset: global_base,
            source_offset: 0,
            source_length: 10,
        }
    }

    #[test]
    fn second_unit_shifts_against_first_units_totals() {
        let mut builder = ModuleTableBuilder::default();
        let remap_a = builder.merge_unit(&[module(0, 0, 2, 0)], 0, 0, 0, 0);
        let remap_b = builder.merge_unit(&[module(0, 0, 1, 0)], 50, 2, 8, 30);

        assert_eq!(remap_a, vec![0]);
        assert_eq!(remap_b, vec![1]);
        assert_eq!(builder.modules[1].name_offset, 50);
        assert_eq!(builder.modules[1].first_function_index, 2);
        assert_eq!(builder.modules[1].global_variable_base_offset, 8);
        assert_eq!(builder.modules[1].source_offset, 30);
    }

    #[test]
    fn module_without_source_keeps_no_source_sentinel_after_shift() {
        let mut m = module(0, 0, 1, 0);
        m.source_offset = NO_SOURCE;
        m.source_length = 0;
        let mut builder = ModuleTableBuilder::default();
        builder.merge_unit(&[m], 0, 0, 0, 40);
        assert!(!builder.modules[0].has_source());
    }
}
