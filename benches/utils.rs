use rand::{Rng, SeedableRng, rngs::StdRng};
use unrepl_engine::{Node, tags};

/// Generate n random server values to use in the benchmark
pub fn generate_random_values(n: usize) -> Vec<Node> {
    let mut rng = StdRng::seed_from_u64(42); // Fixed seed for reproducibility
    (0..n).map(|_| random_value(&mut rng, 3)).collect()
}

fn random_value(rng: &mut StdRng, depth: u32) -> Node {
    if depth == 0 {
        return random_scalar(rng);
    }
    match rng.random_range(0..6) {
        0 => {
            let count = rng.random_range(1..8);
            let mut children: Vec<Node> = (0..count).map(|_| random_value(rng, depth - 1)).collect();
            children.push(random_elision(rng));
            Node::vector(children)
        }
        1 => {
            let count = rng.random_range(1..5);
            Node::map(
                (0..count)
                    .flat_map(|_| [Node::keyword(random_string(rng, 3, 8)), random_value(rng, depth - 1)])
                    .collect(),
            )
        }
        2 => Node::tag(
            tags::STRING,
            Node::vector(vec![Node::string(random_string(rng, 20, 60)), random_elision(rng)]),
        ),
        3 => Node::tag(
            tags::OBJECT,
            Node::vector(vec![
                Node::symbol("clojure.core$map"),
                Node::string("0x1f2e3d"),
                Node::symbol("clojure.core$map@1f2e3d"),
                Node::map(vec![]),
            ]),
        ),
        4 => Node::tag(
            tags::RATIO,
            Node::vector(vec![Node::integer(rng.random_range(1..100)), Node::integer(rng.random_range(1..100))]),
        ),
        _ => random_scalar(rng),
    }
}

fn random_scalar(rng: &mut StdRng) -> Node {
    match rng.random_range(0..4) {
        0 => Node::integer(rng.random_range(-1000..1000)),
        1 => Node::keyword(random_string(rng, 3, 8)),
        2 => Node::string(random_string(rng, 5, 15)),
        _ => Node::boolean(rng.random_bool(0.5)),
    }
}

fn random_elision(rng: &mut StdRng) -> Node {
    if rng.random_bool(0.5) {
        return Node::tag(tags::ELISION, Node::nil());
    }
    Node::tag(
        tags::ELISION,
        Node::map(vec![
            Node::keyword("get"),
            Node::list(vec![Node::symbol("unrepl/fetch"), Node::keyword(random_string(rng, 4, 4))]),
        ]),
    )
}

/// Generate a random string with length between min and max
fn random_string(rng: &mut StdRng, min_len: usize, max_len: usize) -> String {
    let charset = "abcdefghijklmnopqrstuvwxyz";
    let len = rng.random_range(min_len..=max_len);

    (0..len)
        .map(|_| {
            let idx = rng.random_range(0..charset.len());
            charset.chars().nth(idx).unwrap()
        })
        .collect()
}
