// order.rs - Dependency ordering of schema artifacts.
//
// Depth-first traversal over `requires` edges: dependencies are recorded
// before the artifact that needs them, and schema order breaks ties.
// Nodes are marked visiting/done so that a cycle is reported instead of
// recursing forever.

use std::collections::HashMap;

use crate::schema::ArtifactDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Compute the topological artifact order.
///
/// On a cycle, returns the artifact ids along the cycle with the first id
/// repeated at the end (e.g., `["a", "b", "a"]`).
pub(crate) fn topological_order(
    artifacts: &[ArtifactDefinition],
) -> Result<Vec<String>, Vec<String>> {
    let index: HashMap<&str, &ArtifactDefinition> =
        artifacts.iter().map(|a| (a.id.as_str(), a)).collect();
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut path: Vec<&str> = Vec::new();
    let mut order = Vec::with_capacity(artifacts.len());

    for artifact in artifacts {
        visit(&artifact.id, &index, &mut marks, &mut path, &mut order)?;
    }

    Ok(order)
}

fn visit<'a>(
    id: &'a str,
    index: &HashMap<&'a str, &'a ArtifactDefinition>,
    marks: &mut HashMap<&'a str, Mark>,
    path: &mut Vec<&'a str>,
    order: &mut Vec<String>,
) -> Result<(), Vec<String>> {
    match marks.get(id) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => {
            let start = path.iter().position(|p| *p == id).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(|p| p.to_string()).collect();
            cycle.push(id.to_string());
            return Err(cycle);
        }
        None => {}
    }

    let artifact: &'a ArtifactDefinition = match index.get(id) {
        Some(a) => *a,
        None => return Ok(()),
    };

    marks.insert(id, Mark::Visiting);
    path.push(id);

    for dep in &artifact.requires {
        if !index.contains_key(dep.as_str()) {
            tracing::warn!(
                artifact = id,
                dependency = dep.as_str(),
                "artifact requires an id that is not defined in the schema; ignoring"
            );
            continue;
        }
        visit(dep, index, marks, path, order)?;
    }

    path.pop();
    marks.insert(id, Mark::Done);
    order.push(id.to_string());
    Ok(())
}
