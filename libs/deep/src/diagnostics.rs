//! Data-quality diagnostics collected while building shadow layers.

use std::fmt::{Debug, Display};

use arcstr::ArcStr;
use geometry::prelude::*;
use serde::{Deserialize, Serialize};

/// An issue worth reporting to users.
pub trait Diagnostic: Debug + Display {
    /// What users can do about the issue, if anything.
    fn help(&self) -> Option<Box<dyn Display>> {
        None
    }

    fn severity(&self) -> Severity {
        Default::default()
    }
}

#[derive(Copy, Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    #[default]
    Warning,
    Error,
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Logs a diagnostic at the level matching its severity.
pub fn log_issue(issue: &dyn Diagnostic) {
    match issue.severity() {
        Severity::Info => tracing::info!("{issue}"),
        Severity::Warning => tracing::warn!("{issue}"),
        Severity::Error => tracing::error!("{issue}"),
    }
}

/// A collection of issues that keeps count of their severities.
#[derive(Debug, Clone)]
pub struct IssueSet<T> {
    issues: Vec<T>,
    num_errors: usize,
    num_warnings: usize,
}

impl<T> Default for IssueSet<T> {
    fn default() -> Self {
        Self {
            issues: Vec::new(),
            num_errors: 0,
            num_warnings: 0,
        }
    }
}

impl<T> IssueSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.issues.iter()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn num_errors(&self) -> usize {
        self.num_errors
    }

    pub fn num_warnings(&self) -> usize {
        self.num_warnings
    }

    /// Moves every issue of `other` into this set.
    pub fn append(&mut self, other: &mut IssueSet<T>) {
        self.num_errors += other.num_errors;
        self.num_warnings += other.num_warnings;
        self.issues.append(&mut other.issues);
        other.num_errors = 0;
        other.num_warnings = 0;
    }
}

impl<T: Diagnostic> IssueSet<T> {
    pub fn add(&mut self, issue: T) {
        match issue.severity() {
            Severity::Error => self.num_errors += 1,
            Severity::Warning => self.num_warnings += 1,
            Severity::Info => (),
        }
        self.issues.push(issue);
    }

    pub fn has_error(&self) -> bool {
        self.num_errors > 0
    }

    pub fn has_warning(&self) -> bool {
        self.num_warnings > 0
    }
}

impl<T> IntoIterator for IssueSet<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.issues.into_iter()
    }
}

impl<T: Display> Display for IssueSet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for issue in self.issues.iter() {
            writeln!(f, "{}", issue)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeIssueKind {
    /// A polygon whose hull crosses itself.
    OddPolygon,
}

/// A shape dropped while building a shadow layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeIssue {
    kind: ShapeIssueKind,
    cell: ArcStr,
    bbox: Option<Rect>,
}

impl ShapeIssue {
    pub fn odd_polygon(cell: ArcStr, bbox: Option<Rect>) -> Self {
        Self {
            kind: ShapeIssueKind::OddPolygon,
            cell,
            bbox,
        }
    }

    pub fn kind(&self) -> ShapeIssueKind {
        self.kind
    }

    /// The shadow cell the shape would have been stored in.
    pub fn cell(&self) -> &ArcStr {
        &self.cell
    }

    /// The bounding box of the dropped shape, in the cell's coordinates.
    pub fn bbox(&self) -> Option<Rect> {
        self.bbox
    }
}

impl Display for ShapeIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            ShapeIssueKind::OddPolygon => {
                write!(f, "dropped self-intersecting polygon in cell `{}`", self.cell)?
            }
        }
        if let Some(bbox) = self.bbox {
            write!(
                f,
                " at ({}, {})..({}, {})",
                bbox.left(),
                bbox.bot(),
                bbox.right(),
                bbox.top()
            )?;
        }
        Ok(())
    }
}

impl Diagnostic for ShapeIssue {
    fn help(&self) -> Option<Box<dyn Display>> {
        match self.kind {
            ShapeIssueKind::OddPolygon => Some(Box::new(
                "split the polygon into simple parts, or disable odd polygon rejection",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[derive(Debug)]
    struct Fatal;

    impl Display for Fatal {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "fatal")
        }
    }

    impl Diagnostic for Fatal {
        fn severity(&self) -> Severity {
            Severity::Error
        }
    }

    #[test]
    fn counts_severities() {
        let mut issues = IssueSet::new();
        issues.add(Fatal);
        issues.add(Fatal);
        assert!(issues.has_error());
        assert!(!issues.has_warning());
        assert_eq!(issues.num_errors(), 2);

        let mut shapes = IssueSet::new();
        shapes.add(ShapeIssue::odd_polygon("top".into(), None));
        assert_eq!(shapes.num_warnings(), 1);

        let mut all = IssueSet::new();
        all.append(&mut shapes);
        assert_eq!(all.len(), 1);
        assert_eq!(all.num_warnings(), 1);
        assert!(shapes.is_empty());
        assert_eq!(shapes.num_warnings(), 0);
    }

    #[test]
    fn shape_issue_display() {
        let issue = ShapeIssue::odd_polygon("inv".into(), Some(Rect::from_sides(0, 0, 10, 10)));
        assert_eq!(
            issue.to_string(),
            "dropped self-intersecting polygon in cell `inv` at (0, 0)..(10, 10)"
        );
        assert!(issue.help().is_some());
    }
}
