//! Synthetic Swift inputs shared by the benches

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use swiftveil_core::Project;

/// One Swift file of roughly `size` bytes with a realistic construct mix
pub fn generate_swift_source(size: usize, seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = String::from("import Foundation\n\n");
    let mut n = 0;
    while out.len() < size {
        let limit: u32 = rng.gen_range(1..100);
        out.push_str(&format!(
            r#"/// Model number {n}
struct Model{n} {{
    var values: [Int] = []
    let title = "Model {{ {n} }}"

    func total{n}(limit: Int) -> Int {{
        guard limit > {limit} else {{ return 0 }}
        var sum = 0
        for value in values where value < limit {{
            sum += value // running total
        }}
        return sum
    }}
}}

"#
        ));
        n += 1;
    }
    out
}

/// A project of `files` source files of about `size` bytes each
pub fn generate_project(files: usize, size: usize) -> Project {
    Project::from_files(
        (0..files).map(|i| (format!("App/Sources/File{}.swift", i), generate_swift_source(size, i as u64))),
    )
}
