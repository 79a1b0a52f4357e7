//! Script snippets in the syntax of each supported language.
//!
//! Everything the orchestrator sends to an interpreter besides the model
//! scripts themselves is rendered here.

use crate::config::PlotSettings;
use modeljoin_core::Language;
use std::fmt::Write as _;
use std::path::Path;

/// Renders helper snippets for one language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    language: Language,
}

/// Quote a string as a double-quoted literal valid in R and Python
#[must_use]
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn unquote(literal: &str) -> Option<&str> {
    let literal = literal.trim();
    let inner = literal
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| literal.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))?;
    (!inner.contains(['"', '\'', '\\'])).then_some(inner)
}

impl Dialect {
    /// Dialect of a language
    #[must_use]
    pub const fn new(language: Language) -> Self {
        Self { language }
    }

    /// Language rendered
    #[must_use]
    pub const fn language(self) -> Language {
        self.language
    }

    /// File extension of a saved workspace
    #[must_use]
    pub const fn workspace_extension(self) -> &'static str {
        match self.language {
            Language::R => "RData",
            Language::Python => "pkl",
        }
    }

    /// `id <- value`
    #[must_use]
    pub fn assign(self, id: &str, value: &str) -> String {
        match self.language {
            Language::R => format!("{} <- {}", id, value),
            Language::Python => format!("{} = {}", id, value),
        }
    }

    /// One assignment per line, in order
    #[must_use]
    pub fn parameter_script<'a>(self, assignments: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
        let mut script = String::new();
        for (id, value) in assignments {
            script.push_str(&self.assign(id, value));
            script.push('\n');
        }
        script
    }

    /// Rename a session variable, if it exists
    #[must_use]
    pub fn alias(self, original: &str, renamed: &str) -> String {
        match self.language {
            Language::R => format!(
                "if (exists({q}, inherits = FALSE)) {{ {renamed} <- {original}; rm({original}) }}",
                q = quote(original),
            ),
            Language::Python => format!(
                "if {q} in globals():\n    {renamed} = {original}\n    del {original}",
                q = quote(original),
            ),
        }
    }

    /// Change the session's working directory
    #[must_use]
    pub fn chdir(self, dir: &Path) -> String {
        let dir = quote(&dir.display().to_string());
        match self.language {
            Language::R => format!("setwd({})", dir),
            Language::Python => format!("__import__(\"os\").chdir({})", dir),
        }
    }

    /// Install missing packages and load them
    #[must_use]
    pub fn install_packages(self, packages: &[String]) -> String {
        let list = packages.iter().map(|p| quote(p)).collect::<Vec<_>>().join(", ");
        match self.language {
            Language::R => format!(
                "for (.mj_pkg in c({list})) {{\n\
                 \x20 if (!requireNamespace(.mj_pkg, quietly = TRUE)) install.packages(.mj_pkg, repos = \"https://cloud.r-project.org\")\n\
                 \x20 library(.mj_pkg, character.only = TRUE)\n\
                 }}"
            ),
            Language::Python => format!(
                "import importlib.util, subprocess, sys\n\
                 for _mj_pkg in [{list}]:\n\
                 \x20   if importlib.util.find_spec(_mj_pkg) is None:\n\
                 \x20       subprocess.check_call([sys.executable, \"-m\", \"pip\", \"install\", \"--quiet\", _mj_pkg])"
            ),
        }
    }

    /// Print the value of an expression as a literal of the language
    #[must_use]
    pub fn inspect(self, expression: &str) -> String {
        match self.language {
            Language::R => format!(
                "cat(paste(deparse({}), collapse = \"\"), \"\\n\", sep = \"\")",
                expression
            ),
            Language::Python => format!("print(repr({}))", expression),
        }
    }

    /// Run a visualization script with output going to `path`
    #[must_use]
    pub fn plot(self, viz: &str, path: &Path, settings: &PlotSettings) -> String {
        let file = quote(&path.display().to_string());
        let mut script = String::new();
        match self.language {
            Language::R => {
                let _ = writeln!(
                    script,
                    "png({}, width = {}, height = {}, pointsize = {}, res = {})",
                    file, settings.width, settings.height, settings.point_size, settings.resolution
                );
                let _ = write!(script, "tryCatch({{\n{}\n}}, finally = dev.off())", viz);
            }
            Language::Python => {
                let res = settings.resolution.max(1);
                let _ = writeln!(script, "import matplotlib\nmatplotlib.use(\"Agg\")");
                let _ = writeln!(script, "import matplotlib.pyplot as plt");
                let _ = writeln!(script, "plt.rcParams[\"font.size\"] = {}", settings.point_size);
                let _ = writeln!(
                    script,
                    "plt.figure(figsize=({} / {res}, {} / {res}), dpi={res})",
                    settings.width, settings.height
                );
                let _ = writeln!(script, "{}", viz);
                let _ = writeln!(script, "plt.savefig({}, dpi={res})", file);
                let _ = write!(script, "plt.close(\"all\")");
            }
        }
        script
    }

    /// Save every session variable to `path`
    #[must_use]
    pub fn save_workspace(self, path: &Path) -> String {
        let file = quote(&path.display().to_string());
        match self.language {
            Language::R => format!("save.image({})", file),
            Language::Python => format!(
                "import pickle as _mj_pickle\n\
                 _mj_ws = {{}}\n\
                 for _mj_k, _mj_v in list(globals().items()):\n\
                 \x20   if _mj_k.startswith(\"_\"):\n\
                 \x20       continue\n\
                 \x20   try:\n\
                 \x20       _mj_pickle.dumps(_mj_v)\n\
                 \x20       _mj_ws[_mj_k] = _mj_v\n\
                 \x20   except Exception:\n\
                 \x20       pass\n\
                 with open({file}, \"wb\") as _mj_f:\n\
                 \x20   _mj_pickle.dump(_mj_ws, _mj_f)"
            ),
        }
    }

    /// Rewrite a file value so it points into `source_dir`.
    ///
    /// A quoted relative path becomes a quoted path under `source_dir`, a
    /// quoted absolute path is kept. Any other expression is wrapped so the
    /// join happens when the value is evaluated.
    #[must_use]
    pub fn file_value(self, source_dir: &Path, value: &str) -> String {
        if let Some(inner) = unquote(value) {
            let path = Path::new(inner);
            if path.is_absolute() {
                return quote(inner);
            }
            return quote(&source_dir.join(path).display().to_string());
        }
        let dir = quote(&source_dir.display().to_string());
        match self.language {
            Language::R => format!(
                "(function(p) if (grepl(\"^(/|[A-Za-z]:)\", p)) p else file.path({}, p))({})",
                dir, value
            ),
            Language::Python => format!("__import__(\"os\").path.join({}, {})", dir, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const R: Dialect = Dialect::new(Language::R);
    const PY: Dialect = Dialect::new(Language::Python);

    #[test]
    fn test_assign() {
        assert_eq!(R.assign("x", "1"), "x <- 1");
        assert_eq!(PY.assign("x", "1"), "x = 1");
        assert_eq!(
            R.parameter_script([("a", "1"), ("b", "\"s\"")]),
            "a <- 1\nb <- \"s\"\n"
        );
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("a\"b\\c"), "\"a\\\"b\\\\c\"");
        assert_eq!(unquote("'x.csv'"), Some("x.csv"));
        assert_eq!(unquote("\"x.csv\""), Some("x.csv"));
        assert_eq!(unquote("paste0('a', 'b')"), None);
    }

    #[test]
    fn test_alias() {
        assert_eq!(
            R.alias("x", "x_dup"),
            "if (exists(\"x\", inherits = FALSE)) { x_dup <- x; rm(x) }"
        );
        assert_eq!(
            PY.alias("x", "x_dup"),
            "if \"x\" in globals():\n    x_dup = x\n    del x"
        );
    }

    #[test]
    fn test_file_value_literal() {
        let dir = Path::new("/work/left");
        assert_eq!(R.file_value(dir, "\"out.csv\""), "\"/work/left/out.csv\"");
        assert_eq!(PY.file_value(dir, "'data/out.csv'"), "\"/work/left/data/out.csv\"");
        assert_eq!(R.file_value(dir, "\"/abs/out.csv\""), "\"/abs/out.csv\"");
    }

    #[test]
    fn test_file_value_expression() {
        let dir = Path::new("/work/left");
        let r = R.file_value(dir, "paste0(name, \".csv\")");
        assert!(r.contains("file.path(\"/work/left\", p)"));
        assert!(r.ends_with("(paste0(name, \".csv\"))"));
        assert_eq!(
            PY.file_value(dir, "name + \".csv\""),
            "__import__(\"os\").path.join(\"/work/left\", name + \".csv\")"
        );
    }

    #[test]
    fn test_plot_wraps_viz() {
        let settings = PlotSettings::default();
        let r = R.plot("plot(x)", Path::new("/out/a.png"), &settings);
        assert!(r.starts_with("png(\"/out/a.png\", width = 640, height = 480"));
        assert!(r.contains("plot(x)"));
        assert!(r.ends_with("finally = dev.off())"));

        let py = PY.plot("plt.plot(x)", Path::new("/out/a.png"), &settings);
        assert!(py.contains("matplotlib.use(\"Agg\")"));
        assert!(py.contains("plt.savefig(\"/out/a.png\", dpi=72)"));
    }

    #[test]
    fn test_workspace() {
        assert_eq!(R.workspace_extension(), "RData");
        assert_eq!(
            R.save_workspace(Path::new("/out/ws.RData")),
            "save.image(\"/out/ws.RData\")"
        );
        assert!(PY.save_workspace(Path::new("/out/ws.pkl")).contains("open(\"/out/ws.pkl\", \"wb\")"));
    }

    #[test]
    fn test_install_and_inspect() {
        let packages = vec!["deSolve".to_string()];
        assert!(R.install_packages(&packages).contains("c(\"deSolve\")"));
        assert!(PY.install_packages(&packages).contains("[\"deSolve\"]"));
        assert_eq!(PY.inspect("x"), "print(repr(x))");
        assert!(R.inspect("x").starts_with("cat(paste(deparse(x)"));
        assert_eq!(R.chdir(Path::new("/w")), "setwd(\"/w\")");
    }
}
