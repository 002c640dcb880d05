//! Exact text of the line-oriented formats for a small car model.

use featmodel_export::{ExportFormat, ExportSession, export_document};
use featmodel_kernel::{FeatureModel, ModelBuilder, ModelDocument, VersionContents};

fn car() -> VersionContents {
    ModelBuilder::new()
        .root("Car")
        .mandatory("Engine", "Car")
        .xor("Engine", &["Petrol", "Electric"])
        .optional("Radio", "Car")
        .requires("Radio", "Electric")
        .excludes("Petrol", "Radio")
        .constraint("Radio => Engine")
        .build()
        .expect("model")
}

fn render(format: ExportFormat) -> String {
    let contents = car();
    let model = FeatureModel::new("Car");
    ExportSession::new(&model, 2, &contents)
        .export(format)
        .expect("export")
}

#[test]
fn root_with_one_mandatory_child_gives_two_clauses() {
    let contents = ModelBuilder::new()
        .root("R")
        .mandatory("A", "R")
        .build()
        .expect("model");
    let doc = ModelDocument::new(FeatureModel::new("Scenario C"), contents);
    let out = export_document(&doc, ExportFormat::Dimacs).expect("dimacs");
    assert_eq!(
        out,
        "c Feature Model: Scenario C\n\
         c Version: 1\n\
         c Variables: 2\n\
         c Clauses: 2\n\
         c 1 R\n\
         c 2 A\n\
         p cnf 2 2\n\
         1 0\n\
         -1 2 0\n"
    );
}

#[test]
fn dimacs_snapshot() {
    insta::assert_snapshot!(render(ExportFormat::Dimacs), @r"
    c Feature Model: Car
    c Version: 2
    c Variables: 5
    c Clauses: 6
    c 1 Car
    c 2 Engine
    c 3 Petrol
    c 4 Electric
    c 5 Radio
    p cnf 5 6
    1 0
    -1 2 0
    -2 3 4 0
    -2 -3 -4 0
    -5 4 0
    -3 -5 0
    ");
}

#[test]
fn uvl_snapshot() {
    insta::assert_snapshot!(render(ExportFormat::Uvl), @r"
    namespace Car

    features
        Car
            mandatory
                Engine
                    alternative
                        Electric
                        Petrol
            optional
                Radio

    constraints
        Radio => Electric
        !(Petrol & Radio)
        Radio => Engine
    ");
}

#[test]
fn tvl_snapshot() {
    insta::assert_snapshot!(render(ExportFormat::Tvl), @r"
    root Car {
        group allOf {
            Engine {
                group oneOf {
                    Electric,
                    Petrol
                }
            },
            opt Radio
        }
        Radio -> Electric;
        !(Petrol && Radio);
        Radio -> Engine;
    }
    ");
}

#[test]
fn dot_snapshot() {
    insta::assert_snapshot!(render(ExportFormat::Dot), @r#"
    digraph FeatureModel {
      rankdir=TB;
      node [shape=box, style=rounded];
      label="Car";
      labelloc=t;

      f1 [label="Car", fillcolor=lightblue, style="rounded,filled"];
      f2 [label="Engine", fillcolor=lightblue, style="rounded,filled"];
      f4 [label="Electric", fillcolor=white, style="rounded,filled,dashed"];
      f3 [label="Petrol", fillcolor=white, style="rounded,filled,dashed"];
      f5 [label="Radio", fillcolor=white, style="rounded,filled,dashed"];

      f1 -> f2;
      f2 -> f4;
      f2 -> f3;
      f1 -> f5;
      f5 -> f4 [style=dashed, color=green, label="requires"];
      f3 -> f5 [style=dashed, color=red, label="excludes", dir=none];
    }
    "#);
}

#[test]
fn mermaid_snapshot() {
    insta::assert_snapshot!(render(ExportFormat::Mermaid), @r#"
    graph TD
      f1["Car"]
      f2["Engine"]
      f4("Electric")
      f3("Petrol")
      f5("Radio")

      f1 --> f2
      f2 -.-> f4
      f2 -.-> f3
      f1 -.-> f5
      f5 ==>|requires| f4
      f3 -.->|excludes| f5

      classDef mandatory fill:#e1f5ff,stroke:#01579b,stroke-width:2px
      classDef optional fill:#fff,stroke:#666,stroke-width:2px,stroke-dasharray: 5 5
      class f1,f2 mandatory
      class f4,f3,f5 optional
    "#);
}

#[test]
fn every_format_exports_and_unknown_tags_fail() {
    let contents = car();
    let model = FeatureModel::new("Car");
    let session = ExportSession::new(&model, 1, &contents);
    for format in ExportFormat::ALL {
        let out = session.export(format).expect("export");
        assert!(out.ends_with('\n') || format == ExportFormat::Json, "{format}");
        assert!(!out.trim().is_empty(), "{format}");
    }
    let err = session.export_tag("pdf").expect_err("unknown tag");
    assert_eq!(err.class(), "export.unsupported_format");
}
