//! Rendering scan results and mapping them to an exit code.

use std::io::{self, Write};
use std::ops::ControlFlow;

use crate::orphan::Orphan;

/// Printed in table mode when a scan finds nothing.
pub const NO_IDLE_SERVICES: &str = "no idle services found";

const HEADERS: [&str; 5] = ["NAMESPACE", "SERVICE", "TYPE", "CLUSTER-IP", "AGE"];

/// How orphans are written to stdout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Column-aligned table.
    #[default]
    Table,
    /// Indented JSON array.
    Json,
}

/// Writes `orphans` to `out` in `format`.
///
/// # Errors
///
/// Returns any error from writing to `out`.
pub fn write_orphans<W: Write>(
    out: &mut W,
    orphans: &[Orphan],
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, orphans)?;
            writeln!(out)
        }
        OutputFormat::Table if orphans.is_empty() => writeln!(out, "{NO_IDLE_SERVICES}"),
        OutputFormat::Table => write_table(out, orphans),
    }
}

fn write_table<W: Write>(out: &mut W, orphans: &[Orphan]) -> io::Result<()> {
    let rows: Vec<[&str; 5]> = orphans
        .iter()
        .map(|o| {
            [
                o.namespace.as_str(),
                o.service.as_str(),
                o.service_type.as_str(),
                o.cluster_ip.as_str(),
                o.age.as_str(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let rule = widths.map(|w| "-".repeat(w));
    write_row(out, &HEADERS, &widths)?;
    write_row(out, &rule.each_ref().map(String::as_str), &widths)?;
    for row in &rows {
        write_row(out, row, &widths)?;
    }

    Ok(())
}

fn write_row<W: Write>(out: &mut W, cells: &[&str; 5], widths: &[usize; 5]) -> io::Result<()> {
    let [ns, svc, ty, ip, age] = *cells;
    let [ns_w, svc_w, ty_w, ip_w, _] = *widths;
    writeln!(out, "{ns:<ns_w$}  {svc:<svc_w$}  {ty:<ty_w$}  {ip:<ip_w$}  {age}")
}

/// Process exit code for a finished scan.
///
/// `1` when `fail_on_idle` is set and the scan found idle services, `0` otherwise.
#[must_use]
pub fn exit_code(orphans: &[Orphan], fail_on_idle: bool) -> u8 {
    u8::from(fail_on_idle && !orphans.is_empty())
}

/// Decides whether a watch loop keeps going after reporting `orphans`.
///
/// Breaks on the first report whose [`exit_code`] is non-zero.
#[must_use]
pub fn watch_step(orphans: &[Orphan], fail_on_idle: bool) -> ControlFlow<()> {
    if exit_code(orphans, fail_on_idle) == 0 {
        ControlFlow::Continue(())
    } else {
        ControlFlow::Break(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orphan(namespace: &str, service: &str, cluster_ip: &str) -> Orphan {
        Orphan {
            namespace: namespace.to_string(),
            service: service.to_string(),
            service_type: "ClusterIP".to_string(),
            cluster_ip: cluster_ip.to_string(),
            age: "3h12m".to_string(),
        }
    }

    fn render(orphans: &[Orphan], format: OutputFormat) -> String {
        let mut out = Vec::new();
        write_orphans(&mut out, orphans, format).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn table_empty_prints_sentinel() {
        assert_eq!(render(&[], OutputFormat::Table), "no idle services found\n");
    }

    #[test]
    fn table_aligns_columns() {
        let orphans = [
            orphan("default", "web", "10.96.0.10"),
            orphan("kube-system", "legacy-dns", "10.96.100.200"),
        ];

        let table = render(&orphans, OutputFormat::Table);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(
            lines,
            vec![
                "NAMESPACE    SERVICE     TYPE       CLUSTER-IP     AGE",
                "-----------  ----------  ---------  -------------  -----",
                "default      web         ClusterIP  10.96.0.10     3h12m",
                "kube-system  legacy-dns  ClusterIP  10.96.100.200  3h12m",
            ]
        );
    }

    #[test]
    fn json_empty_is_empty_array() {
        assert_eq!(render(&[], OutputFormat::Json), "[]\n");
    }

    #[test]
    fn json_uses_wire_names() {
        let json = render(&[orphan("default", "web", "10.96.0.10")], OutputFormat::Json);

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(
            value,
            serde_json::json!([{
                "namespace": "default",
                "service": "web",
                "type": "ClusterIP",
                "clusterIP": "10.96.0.10",
                "age": "3h12m",
            }])
        );
        assert!(json.contains("\n  {"), "expected indented output: {json}");
    }

    #[test]
    fn exit_code_mapping() {
        let found = [orphan("default", "web", "10.96.0.10")];

        assert_eq!(exit_code(&found, true), 1);
        assert_eq!(exit_code(&found, false), 0);
        assert_eq!(exit_code(&[], true), 0);
        assert_eq!(exit_code(&[], false), 0);
    }

    #[test]
    fn watch_step_breaks_only_when_failing_on_idle() {
        let found = [orphan("default", "web", "10.96.0.10")];

        assert_eq!(watch_step(&found, true), ControlFlow::Break(()));
        assert_eq!(watch_step(&found, false), ControlFlow::Continue(()));
        assert_eq!(watch_step(&[], true), ControlFlow::Continue(()));
        assert_eq!(watch_step(&[], false), ControlFlow::Continue(()));
    }
}
