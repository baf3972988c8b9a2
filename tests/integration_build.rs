//! End-to-end tests for `dashforge build`.

mod common;

use common::TestProject;
use dashforge::tree::{Format, Node};

fn write_sample_templates(project: &TestProject) {
    project.write_template(
        "01_targets",
        "cpu_a.yml.tera",
        "expr: node_load1@{ label_selector(dialect=datasource, labels=labels) }@\nlegendFormat: '{{instance}}'\nrefId: A\n",
    );
    project.write_template(
        "02_panels",
        "cpu.yml.tera",
        "title: CPU load\ntype: graph\ndatasource: @{ datasource }@\ntargets:\n- @{ rendered[\"targets\"][\"cpu_a\"] | to_nice_yaml | indent(width=2) }@\n",
    );
    project.write_template(
        "04_dashboards",
        "overview.yml.tera",
        "title: Overview\npanels:\n- @{ rendered[\"panels\"][\"cpu\"] | to_nice_yaml | indent(width=2) }@\n",
    );
}

fn write_sample_config(project: &TestProject) {
    project.write_config(
        "output_format: [json, yaml]\ndatasource: [prometheus, influxdb]\nlabels: [host]\ntarget: [dashboards]\n",
    );
}

#[test]
fn build_writes_the_output_layout() {
    let project = TestProject::new();
    write_sample_templates(&project);
    write_sample_config(&project);

    let result = project.run(&["build"]);
    assert!(result.success, "build failed:\n{}", result.stderr);
    assert!(result.stdout.contains("saved"));

    for path in [
        "output/json/prometheus/dashboards/overview.json",
        "output/json/influxdb/dashboards/overview.json",
        "output/yaml/prometheus/dashboards/overview.yaml",
        "output/yaml/influxdb/dashboards/overview.yaml",
    ] {
        assert!(project.exists(path), "missing output file {path}");
    }
}

#[test]
fn datasources_get_their_own_dialect() {
    let project = TestProject::new();
    write_sample_templates(&project);
    write_sample_config(&project);

    let result = project.run(&["build"]);
    assert!(result.success, "build failed:\n{}", result.stderr);

    let prom = project.read_file("output/json/prometheus/dashboards/overview.json");
    let influx = project.read_file("output/json/influxdb/dashboards/overview.json");

    assert!(prom.contains("{host=~"), "prometheus output lost its brace selector:\n{prom}");
    assert!(!prom.contains(" AND "), "prometheus output leaked influx syntax:\n{prom}");
    assert!(influx.contains("host = '${host}'"), "influx output lost its clause:\n{influx}");
    assert!(!influx.contains("{host=~"), "influx output leaked prometheus syntax:\n{influx}");

    // native Grafana interpolation passes through untouched
    assert!(prom.contains("{{instance}}"));
}

#[test]
fn json_and_yaml_outputs_parse_to_equal_trees() {
    let project = TestProject::new();
    write_sample_templates(&project);
    write_sample_config(&project);

    let result = project.run(&["build"]);
    assert!(result.success, "build failed:\n{}", result.stderr);

    let json = project.read_file("output/json/prometheus/dashboards/overview.json");
    let yaml = project.read_file("output/yaml/prometheus/dashboards/overview.yaml");
    assert_eq!(
        Node::parse(&json, Format::Json).unwrap(),
        Node::parse(&yaml, Format::Yaml).unwrap()
    );
}

#[test]
fn repeated_builds_are_byte_identical() {
    let project = TestProject::new();
    write_sample_templates(&project);
    write_sample_config(&project);

    assert!(project.run(&["build"]).success);
    let first = project.read_file("output/yaml/prometheus/dashboards/overview.yaml");
    assert!(project.run(&["build"]).success);
    let second = project.read_file("output/yaml/prometheus/dashboards/overview.yaml");
    assert_eq!(first, second);
}

#[test]
fn referencing_a_later_category_fails_the_datasource() {
    let project = TestProject::new();
    project.write_template(
        "01_targets",
        "bad.yml.tera",
        "value: @{ rendered[\"panels\"][\"cpu\"] | to_nice_yaml | indent(width=2) }@\n",
    );
    project.write_config(
        "output_format: [json]\ndatasource: [prometheus]\nlabels: []\ntarget: [dashboards]\n",
    );

    let result = project.run(&["build"]);
    assert!(!result.success);
    assert!(
        result.stderr.contains("renders later in the pipeline"),
        "expected a dependency error, got:\n{}",
        result.stderr
    );
}

#[test]
fn one_broken_datasource_does_not_block_the_others() {
    let project = TestProject::new();
    // the undefined reference only renders for influxdb
    project.write_template(
        "04_dashboards",
        "overview.yml.tera",
        "title: Overview\n{% if datasource == \"influxdb\" %}bad: @{ rendered[\"dashboards\"][\"missing\"] | to_nice_yaml }@\n{% endif %}",
    );
    write_sample_config(&project);

    let result = project.run(&["build"]);
    assert!(!result.success, "build should fail overall");
    assert!(result.stderr.contains("influxdb"));
    assert!(
        project.exists("output/json/prometheus/dashboards/overview.json"),
        "healthy datasource output should still be written"
    );
    assert!(!project.exists("output/json/influxdb/dashboards/overview.json"));
}

#[test]
fn private_fragments_are_rendered_but_not_written() {
    let project = TestProject::new();
    project.write_template("04_dashboards", "_base.yml.tera", "editable: true\n");
    project.write_template(
        "04_dashboards",
        "overview.yml.tera",
        "title: Overview\npanels:\n- @{ rendered[\"dashboards\"][\"_base\"] | to_nice_yaml | indent(width=2) }@\n",
    );
    project.write_config(
        "output_format: [json]\ndatasource: [prometheus]\nlabels: []\ntarget: [dashboards]\n",
    );

    let result = project.run(&["build"]);
    assert!(result.success, "build failed:\n{}", result.stderr);
    assert!(project.exists("output/json/prometheus/dashboards/overview.json"));
    assert!(!project.exists("output/json/prometheus/dashboards/_base.json"));

    let overview = project.read_file("output/json/prometheus/dashboards/overview.json");
    assert!(overview.contains("\"editable\": true"));
}

#[test]
fn duplicate_fragment_files_are_rejected() {
    let project = TestProject::new();
    project.write_template("02_panels", "cpu.yml.tera", "a: 1\n");
    project.write_template("02_panels", "cpu.yaml.tera", "a: 2\n");
    write_sample_config(&project);

    let result = project.run(&["build"]);
    assert!(!result.success);
    assert!(result.stderr.contains("duplicate fragment"), "stderr:\n{}", result.stderr);
}

#[test]
fn missing_config_is_a_clean_error() {
    use assert_cmd::Command;
    use predicates::prelude::*;

    let project = TestProject::new();
    Command::cargo_bin("dashforge")
        .unwrap()
        .current_dir(project.root())
        .args(["build", "--config", "nope.yml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope.yml"));
}

#[test]
fn unknown_target_category_is_reported() {
    let project = TestProject::new();
    write_sample_templates(&project);
    project.write_config(
        "output_format: [json]\ndatasource: [prometheus]\nlabels: []\ntarget: [gadgets]\n",
    );

    let result = project.run(&["build"]);
    assert!(!result.success);
    assert!(result.stderr.contains("unknown target category 'gadgets'"));
}
