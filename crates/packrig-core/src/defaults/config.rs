//! Concrete default rule set for build configurations
//!
//! Rules are registered in dependency order: every compute rule only reads
//! fields that were registered before it, and every composite block is
//! normalized by a transform before any rule targets one of its children.

use std::path::{Path, PathBuf};

use crate::builtins::BuiltinPlugin;
use crate::defaults::engine::OptionsDefaulter;
use crate::errors::Result;
use crate::plugin::PluginEntry;
use crate::template::{to_identifier, value_to_identifier};
use crate::value::{lookup, truthy, OptionMap, OptionValue, Pattern, Shape};

const WEB_TARGETS: [&str; 3] = ["web", "webworker", "electron-renderer"];

fn mode(options: &OptionMap) -> Option<&OptionValue> {
    options.get("mode")
}

fn is_development(options: &OptionMap) -> bool {
    mode(options).and_then(OptionValue::as_str) == Some("development")
}

/// `mode` is `"production"` or unset/falsy
pub fn is_production_like(options: &OptionMap) -> bool {
    match mode(options) {
        Some(OptionValue::String(m)) if m == "production" => true,
        other => !truthy(other),
    }
}

/// `target` is `"web"` or `"webworker"`
pub fn is_web_like(options: &OptionMap) -> bool {
    matches!(target(options), Some("web") | Some("webworker"))
}

fn target(options: &OptionMap) -> Option<&str> {
    options.get("target").and_then(OptionValue::as_str)
}

fn is_browser_target(options: &OptionMap) -> bool {
    target(options).is_some_and(|t| WEB_TARGETS.contains(&t))
}

/// Namespace for source-map module paths, derived from `output.library`
pub fn devtool_namespace(library: Option<&OptionValue>) -> OptionValue {
    match library {
        Some(OptionValue::Array(parts)) => OptionValue::String(
            parts
                .iter()
                .map(|part| match part {
                    OptionValue::String(s) => s.clone(),
                    OptionValue::Null => String::new(),
                    other => other.to_json().map(|j| j.to_string()).unwrap_or_default(),
                })
                .collect::<Vec<_>>()
                .join("."),
        ),
        Some(OptionValue::Object(map)) => devtool_namespace(map.get("root")),
        Some(value) if value.is_truthy() => value.clone(),
        _ => OptionValue::from(""),
    }
}

/// Derive a non-entry chunk filename template from the entry filename
///
/// Templates that already vary per chunk are returned unchanged; otherwise
/// `[id].` is inserted before the first path segment that carries a query or
/// ends the string.
pub fn chunk_filename(filename: &str) -> String {
    if ["[name]", "[id]", "[chunkhash]"]
        .iter()
        .any(|placeholder| filename.contains(placeholder))
    {
        return filename.to_string();
    }

    let candidates = std::iter::once(0).chain(filename.match_indices('/').map(|(i, _)| i + 1));
    for start in candidates {
        let segment_end = filename[start..]
            .find('/')
            .map_or(filename.len(), |offset| start + offset);
        if segment_end == filename.len() || filename[start..segment_end].contains('?') {
            return format!("{}[id].{}", &filename[..start], &filename[start..]);
        }
    }
    filename.to_string()
}

fn runtime_chunk_name(args: &[OptionValue]) -> OptionValue {
    let entrypoint = args
        .first()
        .and_then(OptionValue::as_object)
        .and_then(|entry| entry.get("name"));
    let name = match entrypoint {
        Some(OptionValue::String(name)) => name.clone(),
        Some(OptionValue::Number(n)) => n.to_string(),
        _ => "undefined".to_string(),
    };
    OptionValue::from(format!("runtime~{name}"))
}

fn minimizer(options: &OptionMap) -> OptionValue {
    let devtool_maps = options
        .get("devtool")
        .filter(|d| d.is_truthy())
        .and_then(OptionValue::as_str)
        .is_some_and(|d| d.contains("sourcemap") || d.contains("source-map"));
    let plugin_maps = options
        .get("plugins")
        .and_then(OptionValue::as_array)
        .is_some_and(|plugins| {
            plugins
                .iter()
                .filter_map(OptionValue::as_plugin)
                .any(|p| p.name() == "SourceMapDevToolPlugin")
        });

    let settings = OptionMap::from([
        ("cache".to_string(), OptionValue::Bool(true)),
        ("parallel".to_string(), OptionValue::Bool(true)),
        ("sourceMap".to_string(), OptionValue::Bool(devtool_maps || plugin_maps)),
    ]);
    OptionValue::Array(vec![OptionValue::Plugin(PluginEntry::direct(
        BuiltinPlugin::new("TerserPlugin", settings),
    ))])
}

fn default_module_rules(options: &OptionMap) -> OptionValue {
    let esm_main_fields = if is_browser_target(options) {
        OptionValue::strings(&["browser", "main"])
    } else {
        OptionValue::strings(&["main"])
    };
    OptionValue::Array(vec![
        OptionValue::object([
            ("type", OptionValue::from("javascript/auto")),
            ("resolve", OptionValue::Object(OptionMap::new())),
        ]),
        OptionValue::object([
            ("test", OptionValue::Pattern(Pattern::case_insensitive("\\.mjs$"))),
            ("type", OptionValue::from("javascript/esm")),
            (
                "resolve",
                OptionValue::object([("mainFields", esm_main_fields)]),
            ),
        ]),
        OptionValue::object([
            ("test", OptionValue::Pattern(Pattern::case_insensitive("\\.json$"))),
            ("type", OptionValue::from("json")),
        ]),
        OptionValue::object([
            ("test", OptionValue::Pattern(Pattern::case_insensitive("\\.wasm$"))),
            ("type", OptionValue::from("webassembly/experimental")),
        ]),
    ])
}

fn has_plugins(block: Option<&OptionValue>) -> bool {
    block
        .and_then(OptionValue::as_object)
        .and_then(|b| b.get("plugins"))
        .and_then(OptionValue::as_array)
        .is_some_and(|plugins| !plugins.is_empty())
}

fn shallow_copy(shape: Shape<'_>) -> Option<OptionValue> {
    Some(OptionValue::Object(shape.to_mapping()))
}

/// The build configuration defaulter
///
/// Wraps an [`OptionsDefaulter`] preloaded with every default of the build
/// configuration surface. `context` and `output.path` are derived from the
/// working directory captured at construction.
#[derive(Clone)]
pub struct ConfigDefaulter {
    engine: OptionsDefaulter,
    cwd: PathBuf,
}

impl ConfigDefaulter {
    /// Defaulter rooted at the process working directory
    pub fn new() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::with_cwd(cwd)
    }

    /// Defaulter rooted at an explicit directory
    ///
    /// # Panics
    ///
    /// Panics if a built-in rule reads a path that a later rule resolves.
    pub fn with_cwd(cwd: impl Into<PathBuf>) -> Self {
        let cwd = cwd.into();
        let engine = build_rules(&cwd);

        let hazards = engine.ordering_hazards();
        for hazard in &hazards {
            tracing::warn!(%hazard, "default rule reads a field resolved after it");
        }
        assert!(hazards.is_empty(), "out-of-order default rules: {hazards:?}");

        Self { engine, cwd }
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn engine(&self) -> &OptionsDefaulter {
        &self.engine
    }

    /// Resolve every default for `raw` without modifying it
    pub fn apply(&self, raw: &OptionMap) -> Result<OptionMap> {
        self.engine.apply(raw)
    }
}

impl Default for ConfigDefaulter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConfigDefaulter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigDefaulter")
            .field("cwd", &self.cwd)
            .field("rules", &self.engine.len())
            .finish()
    }
}

fn build_rules(cwd: &Path) -> OptionsDefaulter {
    let mut d = OptionsDefaulter::new();

    d.set_literal("entry", "./src");
    d.set_compute("devtool", &["mode"], |o| {
        Ok(if is_development(o) {
            OptionValue::from("eval")
        } else {
            OptionValue::Bool(false)
        })
    });
    d.set_compute("cache", &["mode"], |o| Ok(OptionValue::Bool(is_development(o))));
    d.set_literal("context", cwd.to_string_lossy().into_owned());
    d.set_literal("target", "web");

    // module
    d.set_transform("module", &[], |value, _| Ok(shallow_copy(value)));
    d.set_literal("module.unknownContextRequest", ".");
    d.set_literal("module.unknownContextRegExp", false);
    d.set_literal("module.unknownContextRecursive", true);
    d.set_literal("module.unknownContextCritical", true);
    d.set_literal("module.exprContextRequest", ".");
    d.set_literal("module.exprContextRegExp", false);
    d.set_literal("module.exprContextRecursive", true);
    d.set_literal("module.exprContextCritical", true);
    d.set_literal("module.wrappedContextRegExp", Pattern::new(".*"));
    d.set_literal("module.wrappedContextRecursive", true);
    d.set_literal("module.wrappedContextCritical", false);
    d.set_literal("module.strictExportPresence", false);
    d.set_literal("module.strictThisContextOnImports", false);
    d.set_compute("module.unsafeCache", &["cache"], |o| {
        Ok(OptionValue::Bool(truthy(o.get("cache"))))
    });
    d.set_literal("module.rules", OptionValue::Array(Vec::new()));
    d.set_compute("module.defaultRules", &["target"], |o| {
        Ok(default_module_rules(o))
    });

    // output
    d.set_transform("output", &[], |value, _| {
        Ok(Some(match value {
            Shape::Scalar(OptionValue::String(filename)) => {
                OptionValue::object([("filename", OptionValue::from(filename.as_str()))])
            }
            other => OptionValue::Object(other.to_mapping()),
        }))
    });
    d.set_literal("output.filename", "[name].js");
    d.set_compute("output.chunkFilename", &["output.filename"], |o| {
        match lookup(o, "output.filename") {
            Some(OptionValue::Function(_)) => Ok(OptionValue::from("[id].js")),
            Some(OptionValue::String(filename)) => Ok(OptionValue::from(chunk_filename(filename))),
            Some(other) => anyhow::bail!(
                "output.filename must be a string or a function, got {}",
                other.type_name()
            ),
            None => anyhow::bail!("output.filename is not defined"),
        }
    });
    d.set_literal("output.webassemblyModuleFilename", "[modulehash].module.wasm");
    d.set_literal("output.library", "");
    for (field, prefix) in [
        ("output.hotUpdateFunction", "webpackHotUpdate"),
        ("output.jsonpFunction", "webpackJsonp"),
        ("output.chunkCallbackName", "webpackChunk"),
    ] {
        d.set_compute(field, &["output.library"], move |o| {
            let library = value_to_identifier(lookup(o, "output.library"));
            Ok(OptionValue::from(to_identifier(&format!("{prefix}{library}"))))
        });
    }
    d.set_compute("output.globalObject", &["target"], |o| {
        let global = match target(o) {
            Some("web" | "electron-renderer" | "node-webkit") => "window",
            Some("webworker") => "self",
            Some("node" | "async-node" | "electron-main") => "global",
            _ => "self",
        };
        Ok(OptionValue::from(global))
    });
    d.set_compute("output.devtoolNamespace", &["output.library"], |o| {
        Ok(devtool_namespace(lookup(o, "output.library")))
    });
    d.set_literal("output.libraryTarget", "var");
    d.set_literal(
        "output.path",
        cwd.join("dist").to_string_lossy().into_owned(),
    );
    d.set_compute("output.pathinfo", &["mode"], |o| {
        Ok(OptionValue::Bool(is_development(o)))
    });
    d.set_literal("output.sourceMapFilename", "[file].map[query]");
    d.set_literal("output.hotUpdateChunkFilename", "[id].[hash].hot-update.js");
    d.set_literal("output.hotUpdateMainFilename", "[hash].hot-update.json");
    d.set_literal("output.crossOriginLoading", false);
    d.set_literal("output.jsonpScriptType", false);
    d.set_literal("output.chunkLoadTimeout", OptionValue::Number(120000.0));
    d.set_literal("output.hashFunction", "md4");
    d.set_literal("output.hashDigest", "hex");
    d.set_literal("output.hashDigestLength", OptionValue::Number(20.0));
    d.set_literal("output.devtoolLineToLine", false);
    d.set_literal("output.strictModuleExceptionHandling", false);

    // node
    d.set_transform("node", &[], |value, _| {
        Ok(Some(match value {
            Shape::Scalar(OptionValue::Bool(b)) => OptionValue::Bool(*b),
            other => OptionValue::Object(other.to_mapping()),
        }))
    });
    d.set_literal("node.console", false);
    d.set_literal("node.process", true);
    d.set_literal("node.global", true);
    d.set_literal("node.Buffer", true);
    d.set_literal("node.setImmediate", true);
    d.set_literal("node.__filename", "mock");
    d.set_literal("node.__dirname", "mock");

    // performance
    d.set_transform("performance", &["mode", "target"], |value, o| {
        Ok(Some(match value {
            Shape::Scalar(OptionValue::Bool(false)) => OptionValue::Bool(false),
            Shape::Absent if !is_production_like(o) || !is_web_like(o) => OptionValue::Bool(false),
            other => OptionValue::Object(other.to_mapping()),
        }))
    });
    d.set_literal("performance.maxAssetSize", OptionValue::Number(250000.0));
    d.set_literal("performance.maxEntrypointSize", OptionValue::Number(250000.0));
    d.set_compute("performance.hints", &["mode"], |o| {
        Ok(if is_production_like(o) {
            OptionValue::from("warning")
        } else {
            OptionValue::Bool(false)
        })
    });

    // optimization
    d.set_transform("optimization", &[], |value, _| Ok(shallow_copy(value)));
    d.set_compute("optimization.removeAvailableModules", &["mode"], |o| {
        Ok(OptionValue::Bool(!is_development(o)))
    });
    d.set_literal("optimization.removeEmptyChunks", true);
    d.set_literal("optimization.mergeDuplicateChunks", true);
    for field in [
        "optimization.flagIncludedChunks",
        "optimization.occurrenceOrder",
        "optimization.sideEffects",
    ] {
        d.set_compute(field, &["mode"], |o| Ok(OptionValue::Bool(is_production_like(o))));
    }
    d.set_literal("optimization.providedExports", true);
    for field in ["optimization.usedExports", "optimization.concatenateModules"] {
        d.set_compute(field, &["mode"], |o| Ok(OptionValue::Bool(is_production_like(o))));
    }
    d.set_literal("optimization.splitChunks", OptionValue::Object(OptionMap::new()));
    d.set_compute("optimization.splitChunks.hidePathInfo", &["mode"], |o| {
        Ok(OptionValue::Bool(is_production_like(o)))
    });
    d.set_literal("optimization.splitChunks.chunks", "async");
    d.set_compute("optimization.splitChunks.minSize", &["mode"], |o| {
        Ok(OptionValue::Number(if is_production_like(o) { 30000.0 } else { 10000.0 }))
    });
    d.set_literal("optimization.splitChunks.minChunks", OptionValue::Number(1.0));
    d.set_compute("optimization.splitChunks.maxAsyncRequests", &["mode"], |o| {
        Ok(OptionValue::Number(if is_production_like(o) { 5.0 } else { f64::INFINITY }))
    });
    d.set_literal("optimization.splitChunks.automaticNameDelimiter", "~");
    d.set_literal(
        "optimization.splitChunks.automaticNameMaxLength",
        OptionValue::Number(109.0),
    );
    d.set_compute("optimization.splitChunks.maxInitialRequests", &["mode"], |o| {
        Ok(OptionValue::Number(if is_production_like(o) { 3.0 } else { f64::INFINITY }))
    });
    d.set_literal("optimization.splitChunks.name", true);
    d.set_literal(
        "optimization.splitChunks.cacheGroups",
        OptionValue::Object(OptionMap::new()),
    );
    d.set_literal(
        "optimization.splitChunks.cacheGroups.default",
        OptionValue::object([
            ("automaticNamePrefix", OptionValue::from("")),
            ("reuseExistingChunk", OptionValue::Bool(true)),
            ("minChunks", OptionValue::Number(2.0)),
            ("priority", OptionValue::Number(-20.0)),
        ]),
    );
    d.set_literal(
        "optimization.splitChunks.cacheGroups.vendors",
        OptionValue::object([
            ("automaticNamePrefix", OptionValue::from("vendors")),
            ("test", OptionValue::Pattern(Pattern::new("[\\\\/]node_modules[\\\\/]"))),
            ("priority", OptionValue::Number(-10.0)),
        ]),
    );
    d.set_transform("optimization.runtimeChunk", &[], |value, _| {
        Ok(match value {
            Shape::Scalar(OptionValue::String(s)) if s == "single" => Some(OptionValue::object([(
                "name",
                OptionValue::from("runtime"),
            )])),
            Shape::Scalar(OptionValue::Bool(true)) => Some(multiple_runtime_chunks()),
            Shape::Scalar(OptionValue::String(s)) if s == "multiple" => {
                Some(multiple_runtime_chunks())
            }
            other => other.to_value(),
        })
    });
    d.set_compute("optimization.noEmitOnErrors", &["mode"], |o| {
        Ok(OptionValue::Bool(is_production_like(o)))
    });
    d.set_compute("optimization.checkWasmTypes", &["mode"], |o| {
        Ok(OptionValue::Bool(is_production_like(o)))
    });
    d.set_literal("optimization.mangleWasmImports", false);
    d.set_compute("optimization.namedModules", &["mode"], |o| {
        Ok(OptionValue::Bool(is_development(o)))
    });
    d.set_literal("optimization.hashedModuleIds", false);
    d.set_compute("optimization.namedChunks", &["mode"], |o| {
        Ok(OptionValue::Bool(is_development(o)))
    });
    d.set_compute(
        "optimization.portableRecords",
        &["recordsInputPath", "recordsOutputPath", "recordsPath"],
        |o| {
            Ok(OptionValue::Bool(
                truthy(o.get("recordsInputPath"))
                    || truthy(o.get("recordsOutputPath"))
                    || truthy(o.get("recordsPath")),
            ))
        },
    );
    d.set_compute("optimization.minimize", &["mode"], |o| {
        Ok(OptionValue::Bool(is_production_like(o)))
    });
    d.set_compute("optimization.minimizer", &["devtool", "plugins"], |o| {
        Ok(minimizer(o))
    });
    d.set_compute("optimization.nodeEnv", &["mode"], |o| {
        Ok(match mode(o) {
            Some(m) if m.is_truthy() => m.clone(),
            _ => OptionValue::from("production"),
        })
    });

    // resolve
    d.set_transform("resolve", &[], |value, _| Ok(shallow_copy(value)));
    d.set_literal("resolve.unsafeCache", true);
    d.set_literal("resolve.modules", OptionValue::strings(&["node_modules"]));
    d.set_literal(
        "resolve.extensions",
        OptionValue::strings(&[".wasm", ".mjs", ".js", ".json"]),
    );
    d.set_literal("resolve.mainFiles", OptionValue::strings(&["index"]));
    d.set_compute("resolve.aliasFields", &["target"], |o| {
        Ok(if is_browser_target(o) {
            OptionValue::strings(&["browser"])
        } else {
            OptionValue::Array(Vec::new())
        })
    });
    d.set_compute("resolve.mainFields", &["target"], |o| {
        Ok(if is_browser_target(o) {
            OptionValue::strings(&["browser", "module", "main"])
        } else {
            OptionValue::strings(&["module", "main"])
        })
    });
    d.set_compute("resolve.cacheWithContext", &["resolve.plugins"], |o| {
        Ok(OptionValue::Bool(has_plugins(o.get("resolve"))))
    });

    // resolveLoader
    d.set_transform("resolveLoader", &[], |value, _| {
        Ok(shallow_copy(value))
    });
    d.set_literal("resolveLoader.unsafeCache", true);
    d.set_literal("resolveLoader.mainFields", OptionValue::strings(&["loader", "main"]));
    d.set_literal("resolveLoader.extensions", OptionValue::strings(&[".js", ".json"]));
    d.set_literal("resolveLoader.mainFiles", OptionValue::strings(&["index"]));
    d.set_compute("resolveLoader.cacheWithContext", &["resolveLoader.plugins"], |o| {
        Ok(OptionValue::Bool(has_plugins(o.get("resolveLoader"))))
    });

    // infrastructureLogging
    d.set_transform("infrastructureLogging", &[], |value, _| {
        Ok(shallow_copy(value))
    });
    d.set_literal("infrastructureLogging.level", "info");
    d.set_literal("infrastructureLogging.debug", false);

    d
}

fn multiple_runtime_chunks() -> OptionValue {
    OptionValue::object([(
        "name",
        OptionValue::function("runtimeChunkName", runtime_chunk_name),
    )])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_filename_injection() {
        assert_eq!(chunk_filename("bundle.js"), "[id].bundle.js");
        assert_eq!(chunk_filename("js/bundle.js"), "js/[id].bundle.js");
        assert_eq!(chunk_filename("js/bundle.js?v=1"), "js/[id].bundle.js?v=1");
        assert_eq!(chunk_filename("a?x/b.js"), "[id].a?x/b.js");
        assert_eq!(chunk_filename("dir/"), "dir/[id].");
        assert_eq!(chunk_filename(""), "[id].");
    }

    #[test]
    fn test_chunk_filename_keeps_chunk_specific_templates() {
        assert_eq!(chunk_filename("[name].js"), "[name].js");
        assert_eq!(chunk_filename("js/[id].js"), "js/[id].js");
        assert_eq!(chunk_filename("[chunkhash].js"), "[chunkhash].js");
    }

    #[test]
    fn test_devtool_namespace_shapes() {
        assert_eq!(
            devtool_namespace(Some(&OptionValue::strings(&["A", "B"]))),
            OptionValue::from("A.B")
        );
        let nested = OptionValue::object([("root", OptionValue::strings(&["Root", "Lib"]))]);
        assert_eq!(devtool_namespace(Some(&nested)), OptionValue::from("Root.Lib"));
        assert_eq!(devtool_namespace(Some(&OptionValue::from(""))), OptionValue::from(""));
        assert_eq!(devtool_namespace(None), OptionValue::from(""));
        assert_eq!(
            devtool_namespace(Some(&OptionValue::object([("amd", OptionValue::from("x"))]))),
            OptionValue::from("")
        );
    }

    #[test]
    fn test_mode_predicates() {
        let mut options = OptionMap::new();
        assert!(is_production_like(&options));
        options.insert("mode".into(), OptionValue::from("none"));
        assert!(!is_production_like(&options));
        options.insert("mode".into(), OptionValue::from(""));
        assert!(is_production_like(&options));

        options.insert("target".into(), OptionValue::from("webworker"));
        assert!(is_web_like(&options));
        options.insert("target".into(), OptionValue::from("electron-renderer"));
        assert!(!is_web_like(&options));
        assert!(is_browser_target(&options));
    }

    #[test]
    fn test_factory_rules_are_ordered() {
        let defaulter = ConfigDefaulter::with_cwd("/work");
        assert!(defaulter.engine().ordering_hazards().is_empty());
    }

    #[test]
    fn test_runtime_chunk_name_function() {
        let entry = OptionValue::object([("name", OptionValue::from("main"))]);
        assert_eq!(runtime_chunk_name(&[entry]), OptionValue::from("runtime~main"));
    }
}
