use crate::graph::DependencyGraph;
use crate::store::NodeId;
use crate::validation::CompileError;
use petgraph::graph::NodeIndex;
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Orders the graph so every node follows all of its producers.
///
/// Kahn's algorithm with a min-heap keyed on declaration order: among the
/// nodes whose producers are all scheduled, the earliest declared runs first,
/// so identical declarations always give identical schedules whatever the
/// request order. A shared node occupies a single graph slot and is therefore
/// scheduled once, as soon as it becomes available.
pub fn schedule(graph: &DependencyGraph) -> Result<Vec<NodeIndex>, CompileError> {
    let g = &graph.graph;
    let count = g.node_count();
    let mut pending: Vec<usize> = g
        .node_indices()
        .map(|idx| g.neighbors_directed(idx, Direction::Incoming).count())
        .collect();

    let key = |idx: NodeIndex| Reverse((g[idx].node, idx.index()));
    let mut ready: BinaryHeap<Reverse<(NodeId, usize)>> =
        g.node_indices().filter(|idx| pending[idx.index()] == 0).map(key).collect();
    let mut order = Vec::with_capacity(count);

    while let Some(Reverse((_, i))) = ready.pop() {
        let idx = NodeIndex::new(i);
        order.push(idx);
        for consumer in g.neighbors_directed(idx, Direction::Outgoing) {
            let slot = &mut pending[consumer.index()];
            *slot -= 1;
            if *slot == 0 {
                ready.push(key(consumer));
            }
        }
    }

    if order.len() < count {
        let cycle = find_cycle(graph).unwrap_or_default();
        return Err(CompileError::CyclicDependency {
            scope: graph.scope().clone(),
            cycle: cycle.into_iter().map(|idx| graph.node(idx).name.clone()).collect(),
        });
    }
    Ok(order)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    None,
    Visiting, // on the current DFS stack
    Visited,
}

/// Returns one cycle as a closed path (`[a, b, a]`), or `None` for a DAG.
pub fn find_cycle(graph: &DependencyGraph) -> Option<Vec<NodeIndex>> {
    let g = &graph.graph;
    let mut state = vec![VisitState::None; g.node_count()];
    let mut stack = Vec::new();

    for idx in g.node_indices() {
        if state[idx.index()] == VisitState::None {
            if let Some(cycle) = visit(idx, graph, &mut state, &mut stack) {
                return Some(cycle);
            }
        }
    }
    None
}

fn visit(
    idx: NodeIndex,
    graph: &DependencyGraph,
    state: &mut Vec<VisitState>,
    stack: &mut Vec<NodeIndex>,
) -> Option<Vec<NodeIndex>> {
    state[idx.index()] = VisitState::Visiting;
    stack.push(idx);

    for next in graph.consumers_of(idx) {
        match state[next.index()] {
            VisitState::Visited => {}
            VisitState::Visiting => {
                let start = stack.iter().position(|&n| n == next).unwrap_or(0);
                let mut cycle = stack[start..].to_vec();
                cycle.push(next);
                return Some(cycle);
            }
            VisitState::None => {
                if let Some(cycle) = visit(next, graph, state, stack) {
                    return Some(cycle);
                }
            }
        }
    }

    stack.pop();
    state[idx.index()] = VisitState::Visited;
    None
}
