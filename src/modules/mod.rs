//! Naming modules (C3): pure functions over a file descriptor's identity
//! plus the accumulated name built by prior pipeline stages.
//!
//! Mirrors the small-pure-helper-with-heavy-unit-tests shape of the
//! teacher's `gc::size`/`gc::auto_cap` modules: every function here is a
//! plain `fn` over plain data, no I/O, and invalidity is returned as data
//! (`InvalidReason`) rather than raised (spec.md section 7: "modules never
//! raise").

pub mod greeklish;

use regex::Regex;

use crate::cache::Cache;
use crate::model::{
    CasePolicy, CounterScope, FallbackPolicy, FileDescriptor, InvalidReason, ModuleConfig, Pipeline,
    SeparatorPolicy,
};

/// What a single naming module produces: either the next accumulated name,
/// or the reason the row is invalid.
pub type FragmentResult = Result<String, InvalidReason>;

/// Shared read-only context every module needs: the whole ordered batch (so
/// `Counter` can enumerate by scope) and the metadata cache (so `Metadata`
/// can read extracted fields).
pub struct NamingContext<'a> {
    pub batch: &'a [FileDescriptor],
    pub cache: &'a Cache,
    pub case_insensitive: bool,
}

/// Runs every stage of `pipeline` over `descriptor` (found at `index` within
/// `context.batch`) and returns the fully transformed name, or the first
/// `InvalidReason` encountered.
pub fn compute_name(
    pipeline: &Pipeline,
    descriptor: &FileDescriptor,
    index: usize,
    context: &NamingContext,
) -> FragmentResult {
    let mut accumulated = String::new();
    for stage in pipeline.fragment_stages() {
        accumulated = fragment(stage, descriptor, index, context, &accumulated)?;
    }
    fragment(pipeline.post_transform(), descriptor, index, context, &accumulated)
}

/// Applies one pipeline stage to the name accumulated so far.
///
/// Producer modules (`Counter`, `Metadata`, `LiteralText`, `OriginalName`)
/// append to `accumulated`. `RemoveText` transforms `accumulated` in place.
/// `NameTransform` is terminal and returns the finished name.
pub fn fragment(
    module: &ModuleConfig,
    descriptor: &FileDescriptor,
    index: usize,
    context: &NamingContext,
    accumulated: &str,
) -> FragmentResult {
    match module {
        ModuleConfig::Counter {
            start,
            step,
            pad_width,
            scope,
        } => {
            let ordinal = counter_ordinal(context.batch, index, *scope);
            let value = start + step * ordinal;
            Ok(format!("{accumulated}{value:0pad_width$}", pad_width = *pad_width))
        }
        ModuleConfig::Metadata {
            field_key,
            date_format,
            fallback_policy,
        } => {
            let entry = context
                .cache
                .get_metadata(&descriptor.absolute_path, context.case_insensitive);
            let rendered = entry
                .as_ref()
                .and_then(|e| e.get(field_key))
                .map(|v| v.render(date_format.as_deref()));
            match rendered {
                Some(value) => Ok(format!("{accumulated}{value}")),
                None => match fallback_policy {
                    FallbackPolicy::Fallback(text) => Ok(format!("{accumulated}{text}")),
                    FallbackPolicy::MarkInvalid => Err(InvalidReason::MissingField(field_key.clone())),
                },
            }
        }
        ModuleConfig::LiteralText { text } => Ok(format!("{accumulated}{text}")),
        ModuleConfig::OriginalName { greeklish } => {
            let rendered = if *greeklish {
                greeklish::transliterate(&descriptor.base_name)
            } else {
                descriptor.base_name.clone()
            };
            Ok(format!("{accumulated}{rendered}"))
        }
        ModuleConfig::RemoveText {
            pattern,
            use_regex,
            case_sensitive,
            first_only,
        } => remove_text(accumulated, pattern, *use_regex, *case_sensitive, *first_only),
        ModuleConfig::NameTransform {
            case_policy,
            separator_policy,
            trim,
        } => Ok(apply_name_transform(accumulated, *case_policy, *separator_policy, *trim)),
    }
}

/// Counts how many selected files sharing `descriptor`'s scope precede it
/// (0-based) in batch order, where `descriptor = &batch[index]`.
fn counter_ordinal(batch: &[FileDescriptor], index: usize, scope: CounterScope) -> i64 {
    let current = &batch[index];
    let mut ordinal = 0i64;
    for (i, candidate) in batch.iter().enumerate() {
        if !candidate.selected {
            continue;
        }
        let same_scope = match scope {
            CounterScope::Global => true,
            CounterScope::PerFolder => candidate.parent_dir() == current.parent_dir(),
            CounterScope::PerExtension => candidate.extension == current.extension,
        };
        if !same_scope {
            continue;
        }
        if i == index {
            return ordinal;
        }
        ordinal += 1;
    }
    0
}

fn remove_text(
    accumulated: &str,
    pattern: &str,
    use_regex: bool,
    case_sensitive: bool,
    first_only: bool,
) -> FragmentResult {
    if use_regex {
        let built = if case_sensitive {
            Regex::new(pattern)
        } else {
            Regex::new(&format!("(?i){pattern}"))
        };
        let re = built.map_err(|e| InvalidReason::BadPattern(e.to_string()))?;
        Ok(if first_only {
            re.replacen(accumulated, 1, "").into_owned()
        } else {
            re.replace_all(accumulated, "").into_owned()
        })
    } else if case_sensitive {
        Ok(if first_only {
            accumulated.replacen(pattern, "", 1)
        } else {
            accumulated.replace(pattern, "")
        })
    } else {
        Ok(remove_literal_case_insensitive(accumulated, pattern, first_only))
    }
}

fn remove_literal_case_insensitive(haystack: &str, pattern: &str, first_only: bool) -> String {
    if pattern.is_empty() {
        return haystack.to_string();
    }
    let lower_haystack = haystack.to_lowercase();
    let lower_pattern = pattern.to_lowercase();
    let mut result = String::with_capacity(haystack.len());
    let mut rest = haystack;
    let mut rest_lower = lower_haystack.as_str();
    let mut removed_once = false;
    while let Some(pos) = rest_lower.find(&lower_pattern) {
        if first_only && removed_once {
            break;
        }
        result.push_str(&rest[..pos]);
        let end = pos + pattern.len();
        rest = &rest[end..];
        rest_lower = &rest_lower[end..];
        removed_once = true;
    }
    result.push_str(rest);
    result
}

fn apply_name_transform(
    accumulated: &str,
    case_policy: CasePolicy,
    separator_policy: SeparatorPolicy,
    trim: bool,
) -> String {
    let separated = match separator_policy {
        SeparatorPolicy::Keep => accumulated.to_string(),
        SeparatorPolicy::Underscore => replace_separators(accumulated, '_'),
        SeparatorPolicy::Dash => replace_separators(accumulated, '-'),
        SeparatorPolicy::Space => replace_separators(accumulated, ' '),
        SeparatorPolicy::Strip => accumulated.chars().filter(|c| !is_separator(*c)).collect(),
    };

    let cased = match case_policy {
        CasePolicy::AsIs => separated,
        CasePolicy::Lower => separated.to_lowercase(),
        CasePolicy::Upper => separated.to_uppercase(),
        CasePolicy::Title => title_case(&separated),
        CasePolicy::Sentence => sentence_case(&separated),
    };

    if trim {
        cased.trim().trim_matches('.').to_string()
    } else {
        cased
    }
}

fn is_separator(c: char) -> bool {
    c == ' ' || c == '_' || c == '-'
}

fn replace_separators(input: &str, to: char) -> String {
    input.chars().map(|c| if is_separator(c) { to } else { c }).collect()
}

fn title_case(input: &str) -> String {
    input
        .split_inclusive(|c: char| is_separator(c) || c.is_whitespace())
        .map(capitalize_word)
        .collect()
}

fn sentence_case(input: &str) -> String {
    let mut chars = input.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str().to_lowercase().as_str(),
        None => String::new(),
    }
}

fn capitalize_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str().to_lowercase().as_str(),
        None => String::new(),
    }
}

/// Renders a Unix timestamp (seconds since epoch, UTC) against a small
/// `strftime`-subset format supporting `%Y %m %d %H %M %S` tokens. No
/// `chrono`/`time` dependency: the civil-from-days conversion is a well
/// known closed-form algorithm (Howard Hinnant's `civil_from_days`), cheap
/// enough to write directly and avoid a crate for six format tokens.
pub fn format_unix_timestamp(unix_secs: i64, format: &str) -> String {
    let days = unix_secs.div_euclid(86_400);
    let secs_of_day = unix_secs.rem_euclid(86_400);
    let (year, month, day) = civil_from_days(days);
    let hour = secs_of_day / 3600;
    let minute = (secs_of_day % 3600) / 60;
    let second = secs_of_day % 60;

    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('Y') => out.push_str(&format!("{year:04}")),
            Some('m') => out.push_str(&format!("{month:02}")),
            Some('d') => out.push_str(&format!("{day:02}")),
            Some('H') => out.push_str(&format!("{hour:02}")),
            Some('M') => out.push_str(&format!("{minute:02}")),
            Some('S') => out.push_str(&format!("{second:02}")),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}

/// Howard Hinnant's `civil_from_days`: converts a day count since the Unix
/// epoch into a proleptic Gregorian `(year, month, day)`.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = if month <= 2 { y + 1 } else { y };
    (year, month, day)
}
