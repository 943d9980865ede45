//! Property tests for topology cycle detection

use conflux_topology::find_cycle;
use conflux_types::Processor;
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Build processors from an adjacency list: `edges[i]` lists the nodes `i` feeds.
fn topology(edges: &[Vec<usize>]) -> Vec<Processor> {
    edges
        .iter()
        .enumerate()
        .map(|(i, targets)| {
            let outputs: Vec<String> = targets.iter().map(|j| format!("q{i}_{j}")).collect();
            let inputs: Vec<String> = edges
                .iter()
                .enumerate()
                .filter(|(_, t)| t.contains(&i))
                .map(|(src, _)| format!("q{src}_{i}"))
                .chain(std::iter::once(format!("ext{i}")))
                .collect();
            Processor::new("acme", format!("p{i}").as_str())
                .with_inputs(inputs.iter().map(String::as_str))
                .with_outputs(outputs.iter().map(String::as_str))
        })
        .collect()
}

/// Random DAG: edges only go from lower to higher index.
fn dag() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1usize..12).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<bool>(), n), n).prop_map(
            move |matrix| {
                (0..n)
                    .map(|i| ((i + 1)..n).filter(|&j| matrix[i][j]).collect())
                    .collect()
            },
        )
    })
}

/// Random directed graph without self edges.
fn digraph() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1usize..10).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<bool>(), n), n).prop_map(
            move |matrix| {
                (0..n)
                    .map(|i| (0..n).filter(|&j| j != i && matrix[i][j]).collect())
                    .collect()
            },
        )
    })
}

proptest! {
    #[test]
    fn dags_never_report_a_cycle(edges in dag()) {
        let nodes = topology(&edges);
        prop_assert!(find_cycle(&nodes).is_none());
    }

    #[test]
    fn back_edge_on_a_chain_is_detected(len in 2usize..15, back_to in 0usize..14) {
        let back_to = back_to % len;
        let mut edges: Vec<Vec<usize>> = (0..len)
            .map(|i| if i + 1 < len { vec![i + 1] } else { vec![] })
            .collect();
        edges[len - 1].push(back_to);

        let nodes = topology(&edges);
        let cycle = find_cycle(&nodes);
        prop_assert!(cycle.is_some());
        let cycle = cycle.unwrap();
        let last = format!("p{}", len - 1);
        let target = format!("p{}", back_to);
        prop_assert!(cycle.contains(&last), "{:?} misses {}", cycle, last);
        prop_assert!(cycle.contains(&target), "{:?} misses {}", cycle, target);
    }

    #[test]
    fn witnesses_are_real_cycles(edges in digraph()) {
        let nodes = topology(&edges);
        if let Some(cycle) = find_cycle(&nodes) {
            let idx: Vec<usize> = cycle
                .nodes()
                .iter()
                .map(|n| n.trim_start_matches('p').parse().unwrap())
                .collect();
            let distinct: BTreeSet<usize> = idx.iter().copied().collect();
            prop_assert_eq!(distinct.len(), idx.len());
            for (k, &from) in idx.iter().enumerate() {
                let to = idx[(k + 1) % idx.len()];
                prop_assert!(edges[from].contains(&to), "missing edge p{} -> p{}", from, to);
            }
        }
    }
}
