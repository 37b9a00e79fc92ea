use std::collections::HashMap;

use crate::error::LinkError;
use crate::unit::CompiledUnit;

/// Orders `units` so that every unit's dependencies precede it. `units[0]`
/// is the primary module; the rest are its (transitive) dependency set.
/// Units unreachable from the primary are dropped from the result.
pub fn topological_order(units: &[CompiledUnit]) -> Result<Vec<usize>, LinkError> {
    let index_by_name: HashMap<&str, usize> = units.iter().enumerate().map(|(i, u)| (u.name.as_str(), i)).collect();

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    let mut marks = vec![Mark::Unvisited; units.len()];
    let mut order = Vec::with_capacity(units.len());

    fn visit(
        index: usize,
        units: &[CompiledUnit],
        index_by_name: &HashMap<&str, usize>,
        marks: &mut Vec<Mark>,
        order: &mut Vec<usize>,
    ) -> Result<(), LinkError> {
        match marks[index] {
            Mark::Done => return Ok(()),
            Mark::InProgress => return Err(LinkError::DependencyCycle(units[index].name.clone())),
            Mark::Unvisited => {}
        }
        marks[index] = Mark::InProgress;
        for dep_name in &units[index].dependencies {
            let dep_index = index_by_name
                .get(dep_name.as_str())
                .ok_or_else(|| LinkError::UnresolvedImport(dep_name.clone()))?;
            visit(*dep_index, units, index_by_name, marks, order)?;
        }
        marks[index] = Mark::Done;
        order.push(index);
        Ok(())
    }

    if units.is_empty() {
        return Ok(order);
    }
    visit(0, units, &index_by_name, &mut marks, &mut order)?;
    Ok(order)
}
