#![allow(dead_code)]

use ricegen::config::ProviderKind;
use ricegen::{Generation, Generator, ProviderFactory, Rules};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A scratch directory holding headers for one test.
pub struct TestProject {
    pub dir: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn add_file(&self, path: &str, content: &str) -> PathBuf {
        let file_path = self.dir.path().join(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(&file_path, content).expect("Failed to write file");
        file_path
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

pub fn rules() -> Rules {
    Rules {
        predicate_prefixes: vec!["is".to_string()],
        external_namespaces: vec!["std".to_string()],
        max_instantiation_rounds: 32,
        ..Rules::default()
    }
}

/// Parse the given headers with tree-sitter and generate, in the given order.
pub fn generate_headers(rules: &Rules, headers: &[(&str, &str)]) -> Generation {
    let project = TestProject::new();
    let paths: Vec<PathBuf> = headers
        .iter()
        .map(|(name, code)| project.add_file(name, code))
        .collect();
    let factory = ProviderFactory::new(ProviderKind::Cpp, Vec::new());
    Generator::new(rules)
        .run(&factory, &paths)
        .expect("Generation failed")
}

/// Source unit generated for `stem`.
pub fn unit<'g>(generation: &'g Generation, stem: &str) -> &'g str {
    &generation
        .units
        .iter()
        .find(|u| u.stem == stem)
        .unwrap_or_else(|| panic!("no unit for {stem}"))
        .cpp
}

pub mod sample_headers {
    pub const SHAPES: &str = r#"#pragma once

#define SHAPES_VERSION 3

namespace Shapes {

enum class Color { Red, Green, Blue };

class Circle {
public:
    Circle(double radius);
    double area() const;
    bool isEmpty() const;
    void scale(double factor);
    void scale(double x, double y);
    const int id = 0;
    Color color;

private:
    double radius_;
};

double distance(const Circle& a, const Circle& b);

} // namespace Shapes
"#;

    pub const BUFFERS: &str = r#"#pragma once

struct Handle;

struct Widget {
    int size;
};

void release(Handle* handle);
int measure(Widget* widget);
[[deprecated("use measure")]] int oldMeasure(Widget* widget);
void fill(int* values, int count);
int* data();
void resize(int rows, int cols = 10);
void log(const char* format, ...);
"#;
}
