//! YAML codec: `yaml-rust` events in, `serde_yaml` out.
//!
//! Parsing walks the event stream directly so that every node can be tied
//! to its source position. A node's span runs from its own marker to the
//! marker of the event that follows it.

use std::str::Chars;

use shunt_core::{
    application::{
        ApplicationError,
        ports::{DocumentCodec, ESCAPE_FILTER, ParsedDocument},
    },
    domain::{
        LineInformation, Location, Markup, Node, NodeMap, NodePath, Provenance, contains_markup,
        split_markup,
    },
    error::{ShuntError, ShuntResult},
};
use tracing::trace;

use super::escape_double_quoted;
use yaml_rust::{
    Event,
    parser::Parser as YamlParser,
    scanner::{Marker, ScanError, TScalarStyle},
};

/// YAML implementation of [`DocumentCodec`].
///
/// Only the first document of a stream is read. Aliases and tags are
/// rejected; anchors are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlCodec;

impl YamlCodec {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentCodec for YamlCodec {
    fn parse(&self, text: &str) -> ShuntResult<ParsedDocument> {
        Loader::new(text).load()
    }

    fn dump(&self, node: &Node) -> ShuntResult<String> {
        serde_yaml::to_string(node).map_err(|e| ShuntError::Internal {
            message: format!("failed to serialize document: {e}"),
        })
    }

    /// Strings holding markup are written double-quoted by hand: plain text
    /// is escaped now and every `{{ ... }}` output is escaped at render time.
    /// The rest goes through [`Self::dump`] with a stand-in for each of them.
    fn dump_for_render(&self, node: &Node) -> ShuntResult<String> {
        let mut stand_ins = StandIns::for_tree(node);
        let masked = stand_ins.mask(node);
        let text = self.dump(&masked)?;
        Ok(stand_ins.restore(text))
    }
}

/// Plain-scalar tokens standing in for templated strings during a dump.
struct StandIns {
    prefix: String,
    scalars: Vec<String>,
}

impl StandIns {
    /// Pick a token prefix that no string in `node` contains.
    fn for_tree(node: &Node) -> Self {
        let mut prefix = String::from("shunt_markup_");
        while mentions(node, &prefix) {
            prefix.insert(0, '_');
        }
        Self {
            prefix,
            scalars: Vec::new(),
        }
    }

    fn mask(&mut self, node: &Node) -> Node {
        match node {
            Node::String(s) => Node::String(self.mask_str(s)),
            Node::Sequence(items) => Node::Sequence(items.iter().map(|i| self.mask(i)).collect()),
            Node::Map(map) => Node::Map(
                map.iter()
                    .map(|(key, value)| (self.mask_str(key), self.mask(value)))
                    .collect(),
            ),
            scalar => scalar.clone(),
        }
    }

    fn mask_str(&mut self, text: &str) -> String {
        if !contains_markup(text) {
            return text.to_string();
        }
        let token = format!("{}{}_", self.prefix, self.scalars.len());
        self.scalars.push(quoted_template(text));
        token
    }

    fn restore(self, mut text: String) -> String {
        for (index, scalar) in self.scalars.iter().enumerate() {
            let token = format!("{}{index}_", self.prefix);
            text = text.replacen(&token, scalar, 1);
        }
        text
    }
}

fn mentions(node: &Node, needle: &str) -> bool {
    match node {
        Node::String(s) => s.contains(needle),
        Node::Sequence(items) => items.iter().any(|i| mentions(i, needle)),
        Node::Map(map) => map
            .iter()
            .any(|(key, value)| key.contains(needle) || mentions(value, needle)),
        _ => false,
    }
}

/// `text` as a double-quoted scalar whose rendering stays one scalar.
fn quoted_template(text: &str) -> String {
    let mut out = String::from("\"");
    for piece in split_markup(text) {
        match piece {
            Markup::Text(plain) => out.push_str(&escape_double_quoted(plain)),
            Markup::Output(output) => {
                out.push_str(&format!("{{% filter {ESCAPE_FILTER} %}}{output}{{% endfilter %}}"));
            }
            Markup::Tag(tag) => out.push_str(tag),
        }
    }
    out.push('"');
    out
}

struct Loader<'a> {
    parser: YamlParser<Chars<'a>>,
    /// Byte offset of every char index, plus the end of the text.
    byte_offsets: Vec<usize>,
    provenance: Provenance,
}

impl<'a> Loader<'a> {
    fn new(text: &'a str) -> Self {
        let byte_offsets = text
            .char_indices()
            .map(|(byte, _)| byte)
            .chain(std::iter::once(text.len()))
            .collect();
        Self {
            parser: YamlParser::new(text.chars()),
            byte_offsets,
            provenance: Provenance::new(),
        }
    }

    fn load(mut self) -> ShuntResult<ParsedDocument> {
        self.expect(|e| matches!(e, Event::StreamStart), "stream start")?;

        let root = if matches!(self.peek()?, Event::DocumentStart) {
            self.next()?;
            let root = self.node(NodePath::root())?;
            self.expect(|e| matches!(e, Event::DocumentEnd), "document end")?;
            root
        } else {
            Node::Null
        };

        Ok(ParsedDocument::new(root).with_provenance(self.provenance))
    }

    fn node(&mut self, path: NodePath) -> ShuntResult<Node> {
        let (event, start) = self.next()?;
        let node = match event {
            Event::Scalar(value, style, _, tag) => {
                if tag.is_some() {
                    return Err(self.malformed("tags are not supported", &start));
                }
                scalar(value, style)
            }
            Event::SequenceStart(_) => self.sequence(&path)?,
            Event::MappingStart(_) => self.mapping(&path)?,
            Event::Alias(_) => return Err(self.malformed("aliases are not supported", &start)),
            other => {
                return Err(self.malformed(&format!("unexpected {other:?}"), &start));
            }
        };

        let end = self.peek_marker()?;
        let info = self.line_info(&start).until(&self.line_info(&end));
        trace!(path = %path, %info, "parsed node");
        self.provenance.record(path, info);
        Ok(node)
    }

    fn sequence(&mut self, path: &NodePath) -> ShuntResult<Node> {
        let mut items = Vec::new();
        while !matches!(self.peek()?, Event::SequenceEnd) {
            items.push(self.node(path.child(items.len()))?);
        }
        self.next()?;
        Ok(Node::Sequence(items))
    }

    fn mapping(&mut self, path: &NodePath) -> ShuntResult<Node> {
        let mut map = NodeMap::new();
        while !matches!(self.peek()?, Event::MappingEnd) {
            let (event, marker) = self.next()?;
            let key = match event {
                Event::Scalar(key, _, _, None) => key,
                _ => return Err(self.malformed("mapping keys must be plain scalars", &marker)),
            };
            let value = self.node(path.child(key.as_str()))?;
            map.insert(key, value);
        }
        self.next()?;
        Ok(Node::Map(map))
    }

    fn next(&mut self) -> ShuntResult<(Event, Marker)> {
        self.parser.next().map_err(|e| self.scan_error(&e))
    }

    fn peek(&mut self) -> ShuntResult<&Event> {
        match self.parser.peek() {
            Ok((event, _)) => Ok(event),
            Err(e) => Err(scan_error(&self.byte_offsets, &e)),
        }
    }

    fn peek_marker(&mut self) -> ShuntResult<Marker> {
        match self.parser.peek() {
            Ok((_, marker)) => Ok(*marker),
            Err(e) => Err(scan_error(&self.byte_offsets, &e)),
        }
    }

    fn expect(&mut self, is: impl Fn(&Event) -> bool, what: &str) -> ShuntResult<()> {
        let (event, marker) = self.next()?;
        if is(&event) {
            Ok(())
        } else {
            Err(self.malformed(&format!("expected {what}, found {event:?}"), &marker))
        }
    }

    fn line_info(&self, marker: &Marker) -> LineInformation {
        line_info(&self.byte_offsets, marker)
    }

    fn malformed(&self, reason: &str, marker: &Marker) -> ShuntError {
        ApplicationError::MalformedDocument {
            reason: reason.to_string(),
            location: self.line_info(marker).into(),
        }
        .into()
    }

    fn scan_error(&self, e: &ScanError) -> ShuntError {
        scan_error(&self.byte_offsets, e)
    }
}

fn line_info(byte_offsets: &[usize], marker: &Marker) -> LineInformation {
    let byte = byte_offsets
        .get(marker.index())
        .or(byte_offsets.last())
        .copied()
        .unwrap_or_default();
    LineInformation::at(marker.line(), marker.col() + 1, byte)
}

fn scan_error(byte_offsets: &[usize], e: &ScanError) -> ShuntError {
    ApplicationError::MalformedDocument {
        reason: e.to_string(),
        location: Location::from(line_info(byte_offsets, e.marker())),
    }
    .into()
}

/// Type a scalar the way YAML 1.2 core schema does for plain scalars;
/// quoted and block scalars are always strings.
fn scalar(value: String, style: TScalarStyle) -> Node {
    if style != TScalarStyle::Plain {
        return Node::String(value);
    }
    match yaml_rust::Yaml::from_str(&value) {
        yaml_rust::Yaml::Integer(i) => Node::Integer(i),
        real @ yaml_rust::Yaml::Real(_) => real.as_f64().map_or(Node::String(value), Node::Float),
        yaml_rust::Yaml::Boolean(b) => Node::Bool(b),
        yaml_rust::Yaml::Null => Node::Null,
        _ => Node::String(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ParsedDocument {
        YamlCodec::new().parse(text).unwrap()
    }

    fn path(s: &str) -> NodePath {
        s.parse().unwrap()
    }

    #[test]
    fn plain_scalars_are_typed_and_quoted_stay_strings() {
        let doc = parse("a: 1\nb: 2.5\nc: true\nd: ~\ne: '1'\nf: hello\n");
        let root = doc.root.as_map().unwrap();
        assert_eq!(root["a"], Node::Integer(1));
        assert_eq!(root["b"], Node::Float(2.5));
        assert_eq!(root["c"], Node::Bool(true));
        assert_eq!(root["d"], Node::Null);
        assert_eq!(root["e"], Node::from("1"));
        assert_eq!(root["f"], Node::from("hello"));
    }

    #[test]
    fn keeps_document_order() {
        let doc = parse("z: 1\na: 2\nm: 3\n");
        let keys: Vec<_> = doc.root.as_map().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn records_provenance_per_path() {
        let doc = parse("project:\n  views:\n    - README.md\n    - b.txt\n");
        let provenance = doc.provenance.unwrap();

        let first = provenance.get(&path("project/views/[0]")).unwrap();
        assert_eq!(first.start_line, Some(3));
        assert_eq!(first.start_char, Some(7));
        assert_eq!(first.start_byte, Some(24));

        let second = provenance.get(&path("project/views/[1]")).unwrap();
        assert_eq!(second.start_line, Some(4));
        assert!(provenance.get(&NodePath::root()).is_some());
    }

    #[test]
    fn byte_offsets_account_for_multibyte_chars() {
        let doc = parse("é: x\nb: y\n");
        let info = *doc.provenance.unwrap().get(&path("b")).unwrap();
        assert_eq!(info.start_line, Some(2));
        assert_eq!(info.start_char, Some(4));
        assert_eq!(info.start_byte, Some(9));
    }

    #[test]
    fn empty_input_is_null() {
        assert_eq!(parse("").root, Node::Null);
        assert_eq!(parse("# only a comment\n").root, Node::Null);
    }

    #[test]
    fn only_first_document_is_used() {
        assert_eq!(parse("a: 1\n---\nb: 2\n").root, [("a", Node::Integer(1))].into_iter().collect());
    }

    #[test]
    fn aliases_and_tags_are_rejected() {
        for text in ["a: &x 1\nb: *x\n", "a: !custom 1\n"] {
            let err = YamlCodec::new().parse(text).unwrap_err();
            assert!(
                matches!(err, ShuntError::Application(ApplicationError::MalformedDocument { .. })),
                "{text:?}"
            );
        }
    }

    #[test]
    fn syntax_errors_carry_a_location() {
        let err = YamlCodec::new().parse("a: [1, 2\n").unwrap_err();
        match err {
            ShuntError::Application(ApplicationError::MalformedDocument { location, .. }) => {
                assert!(location.info().is_some());
            }
            other => panic!("expected MalformedDocument, got {other:?}"),
        }
    }

    #[test]
    fn templated_strings_are_double_quoted_with_escaped_outputs() {
        let doc: Node = [
            ("name", Node::from("issue {{ tag }}")),
            ("{{ key }}", Node::from("say \"{{ word | upper }}\"")),
            ("plain", Node::from("#1")),
        ]
        .into_iter()
        .collect();
        let text = YamlCodec::new().dump_for_render(&doc).unwrap();

        assert!(
            text.contains(r#"name: "issue {% filter shunt_escape %}{{ tag }}{% endfilter %}""#),
            "{text}"
        );
        assert!(
            text.contains(
                r#""{% filter shunt_escape %}{{ key }}{% endfilter %}": "say \"{% filter shunt_escape %}{{ word | upper }}{% endfilter %}\"""#
            ),
            "{text}"
        );
        assert!(text.contains("plain: '#1'"), "{text}");
    }

    #[test]
    fn statements_pass_through_unescaped() {
        let doc: Node = [("_", Node::from("{% set x = \"a: b\" %}"))].into_iter().collect();
        let text = YamlCodec::new().dump_for_render(&doc).unwrap();
        assert_eq!(text.trim_end(), r#"_: "{% set x = "a: b" %}""#);
    }

    #[test]
    fn stand_in_tokens_avoid_user_text() {
        let doc: Node = [
            ("a", Node::from("shunt_markup_0_")),
            ("b", Node::from("{{ x }}")),
        ]
        .into_iter()
        .collect();
        let text = YamlCodec::new().dump_for_render(&doc).unwrap();
        assert!(text.contains("a: shunt_markup_0_"), "{text}");
        assert!(text.contains(r#"b: "{% filter"#), "{text}");
    }

    #[test]
    fn dump_then_parse_preserves_tree() {
        let codec = YamlCodec::new();
        let doc = parse("_: '{% set x = \"a: b\" %}'\nname: '{{ x }}'\nlist:\n  - 1\n  - text\n");
        let again = codec.parse(&codec.dump(&doc.root).unwrap()).unwrap();
        assert_eq!(again.root, doc.root);
    }
}
