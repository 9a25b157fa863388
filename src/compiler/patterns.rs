//! Line-anchored statement patterns.
//!
//! The compiler works on structural `import`/`export` statement lines, not on
//! a syntax tree. Every recognized shape lives here so the shapes themselves
//! are auditable in one place.

use once_cell::sync::Lazy;
use regex::Regex;

/// Separates the relative subpath from the remote symbol in map values.
pub const KEY_SEPARATOR: &str = "::";

/// Remote-symbol sentinel for a whole-module namespace export.
pub const KEY_ALL: &str = "*";

/// Remote-symbol sentinel for a default export.
pub const KEY_DEFAULT: &str = "default";

#[cfg(windows)]
pub const EOL: &str = "\r\n";
#[cfg(not(windows))]
pub const EOL: &str = "\n";

/// Every line starting with `export`.
pub static EXPORT_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^export\s.*$").unwrap());

/// `export = xxx` (legacy whole-module aggregate). The right-hand side can
/// be any expression (`$`, `foo.bar`, `require('x')`) and is never inspected.
pub static EXPORT_ASSIGN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^export\s+=\s+").unwrap());

/// `export { a, b as c } from 'xxx'`.
pub static EXPORT_LIST_FROM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^export\s+\{([^}]*?)\}\s+from\s+['"](.*?)['"]"#).unwrap());

/// `export * from 'xxx'`.
pub static EXPORT_ALL_FROM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^export\s+\*\s+from\s+['"](.*?)['"]"#).unwrap());

/// `export default ...`.
pub static EXPORT_DEFAULT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^export\s+default\s").unwrap());

/// A top-level exported declaration, e.g. `export interface X`,
/// `export declare abstract class Y`.
pub static EXPORT_DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^export\s+(?:declare\s+)?(?:abstract\s+)?(?:async\s+)?(?:class|type|function|interface|const|let)\s+(\w+)",
    )
    .unwrap()
});

/// `export { a, b as c }` with no `from`. Must be tested after
/// [`EXPORT_LIST_FROM`].
pub static EXPORT_LIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^export\s+\{([^}]*?)\}").unwrap());

/// `export namespace X { ... }` blocks are stripped wholesale before line
/// analysis; their nested `export` keywords would otherwise be read as
/// top-level statements.
pub static EXPORT_NAMESPACE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^export namespace[\s\S]*?\n\}").unwrap());

/// Every line starting with `import`.
pub static IMPORT_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^import\s.*$").unwrap());

/// `import * as xxx from 'yyy'`.
pub static IMPORT_NAMESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^import\s+\*\s+as\s+(\w+)\s+from\s+['"](.*?)['"]"#).unwrap());

/// `import xxx from 'yyy'`. Whether this is truly a default import depends on
/// the target file (`allowSyntheticDefaultImports` lets a namespace pose as a
/// default), so the compiler double-checks the target's declares.
pub static IMPORT_DEFAULT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^import\s+(\w+)\s+from\s+['"](.*?)['"]"#).unwrap());

/// `import { a, b as c } from 'yyy'`.
pub static IMPORT_LIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^import\s+\{([^}]*?)\}\s+from\s+['"](.*?)['"]"#).unwrap());

/// `import xxx, { a, b } from 'yyy'`.
pub static IMPORT_DEFAULT_AND_LIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^import\s+(\w+)\s*,\s*\{([^}]*?)\}\s+from\s+['"](.*?)['"]"#).unwrap());

/// `import { a, b }, xxx from 'yyy'`.
pub static IMPORT_LIST_AND_DEFAULT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^import\s+\{([^}]*?)\}\s*,\s*(\w+)\s+from\s+['"](.*?)['"]"#).unwrap());

/// Side-effect-only import such as `import './index.scss'`, skipped silently.
pub static IMPORT_SIDE_EFFECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^import\s+['"](.*?)['"]"#).unwrap());

/// Splits `"a, b as c"` bracket interiors. Trim before splitting.
pub static LIST_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*,\s*").unwrap());

/// `a as b` inside a bracket list.
pub static AS_ALIAS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\w+)\s+as\s+(\w+)$").unwrap());

static BLOCK_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\*.*?\*/").unwrap());

/// Removes `/* ... */` comments from a single statement line.
pub fn strip_inline_comment(line: &str) -> String {
    BLOCK_COMMENT.replace_all(line, "").into_owned()
}

/// Splits a `a as b` entry into `(exported_name, remote_name)`; the remote
/// part is `None` for a plain entry.
pub fn split_alias(field: &str) -> (String, Option<String>) {
    match AS_ALIAS.captures(field) {
        Some(caps) => (caps[2].to_string(), Some(caps[1].to_string())),
        None => (field.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declaration_pattern_accepts_modifiers() {
        for line in [
            "export class Foo {",
            "export declare abstract class Foo {",
            "export declare async function Foo(): void",
            "export interface Foo {",
            "export type Foo = string",
            "export const Foo = 1",
            "export let Foo = 1",
        ] {
            let caps = EXPORT_DECLARATION.captures(line).expect(line);
            assert_eq!(&caps[1], "Foo");
        }
    }

    #[test]
    fn export_assign_accepts_any_rhs() {
        for line in [
            "export = $",
            "export = foo.bar",
            "export = require('x')",
            "export = x",
        ] {
            assert!(EXPORT_ASSIGN.is_match(line), "{line}");
        }
    }

    #[test]
    fn declaration_pattern_rejects_default() {
        assert!(EXPORT_DECLARATION.captures("export default class Foo {").is_none());
        assert!(EXPORT_DEFAULT.is_match("export default class Foo {"));
    }

    #[test]
    fn strip_inline_comment_removes_blocks() {
        assert_eq!(
            strip_inline_comment("import {a /* alpha */, b} from './x'"),
            "import {a , b} from './x'"
        );
    }

    #[test]
    fn split_alias_handles_both_forms() {
        assert_eq!(split_alias("a"), ("a".to_string(), None));
        assert_eq!(split_alias("a as b"), ("b".to_string(), Some("a".to_string())));
    }

    #[test]
    fn namespace_block_is_strippable() {
        let src = "export namespace N {\n  export const x = 1\n}\nexport const y = 2\n";
        let out = EXPORT_NAMESPACE_BLOCK.replace_all(src, "");
        assert!(!out.contains("x = 1"));
        assert!(out.contains("y = 2"));
    }
}
