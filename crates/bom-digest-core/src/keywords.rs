//! Keyword extraction by part-of-speech filtering.
//!
//! Free text is tokenized, tagged with universal part-of-speech tags, and
//! reduced to the tokens that can name a part:
//!
//! 1. tag is noun, proper noun, or adjective;
//! 2. not an English stop word (case-insensitive);
//! 3. purely alphabetic, or containing a hyphen (`T-slot`).
//!
//! Output keeps source order and duplicates. No case folding or stemming
//! is applied.
//!
//! Tagging goes through the [`PosTagger`] trait. [`LexiconTagger`] is the
//! built-in implementation: closed-class word lists, a verb lexicon,
//! suffix morphology, and context rules for noun/verb ambiguity.

use serde::{Deserialize, Serialize};

/// Universal part-of-speech tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Pos {
    Adj,
    Adp,
    Adv,
    Aux,
    Cconj,
    Det,
    Intj,
    Noun,
    Num,
    Part,
    Pron,
    Propn,
    Punct,
    Sconj,
    Sym,
    Verb,
    X,
}

impl Pos {
    /// Tags whose tokens are kept as keyword candidates.
    pub fn is_content(self) -> bool {
        matches!(self, Pos::Noun | Pos::Propn | Pos::Adj)
    }
}

/// Assigns one tag per token.
pub trait PosTagger: Send + Sync {
    /// Tag `tokens`; the result has the same length and order.
    fn tag(&self, tokens: &[&str]) -> Vec<Pos>;
}

/// Reduces free text to keyword candidates.
pub struct KeywordExtractor {
    tagger: Box<dyn PosTagger>,
}

impl KeywordExtractor {
    pub fn new(tagger: Box<dyn PosTagger>) -> Self {
        Self { tagger }
    }

    /// Keywords of one text, in order of appearance.
    pub fn extract(&self, text: &str) -> Vec<String> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Vec::new();
        }
        let tags = self.tagger.tag(&tokens);
        tokens
            .iter()
            .zip(tags)
            .filter(|(token, pos)| is_keyword(token, *pos))
            .map(|(token, _)| token.to_string())
            .collect()
    }

    /// Keywords of every text, pooled in input order. Empty texts
    /// contribute nothing.
    pub fn extract_all<S: AsRef<str>>(&self, texts: &[S]) -> Vec<String> {
        texts
            .iter()
            .map(AsRef::as_ref)
            .filter(|t| !t.trim().is_empty())
            .flat_map(|t| self.extract(t))
            .collect()
    }
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new(Box::new(LexiconTagger))
    }
}

/// The keyword filter applied to one tagged token.
pub fn is_keyword(token: &str, pos: Pos) -> bool {
    pos.is_content()
        && !is_stop_word(token)
        && (token.chars().all(char::is_alphabetic) || token.contains('-'))
        && !token.is_empty()
}

// ============ Tokenizer ============

const CLITICS: &[&str] = &["'s", "'re", "'ll", "'ve", "'d", "'m"];

fn is_joiner(c: char) -> bool {
    matches!(c, '-' | '\'' | '\u{2019}' | '.')
}

/// Split text into word and punctuation tokens.
///
/// Words are runs of alphanumerics joined by internal hyphens or
/// apostrophes, plus internal dots between digits (`9.3.4`). Clitics are
/// split off (`didn't` → `did`, `n't`; `screw's` → `screw`, `'s`). Every
/// other non-space character is its own token.
pub fn tokenize(text: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (start, c) = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if !c.is_alphanumeric() {
            let end = chars.get(i + 1).map(|(b, _)| *b).unwrap_or(text.len());
            tokens.push(&text[start..end]);
            i += 1;
            continue;
        }

        let mut j = i + 1;
        while j < chars.len() {
            let (_, cj) = chars[j];
            if cj.is_alphanumeric() {
                j += 1;
                continue;
            }
            let next_is_word = chars.get(j + 1).is_some_and(|(_, n)| n.is_alphanumeric());
            let joins = is_joiner(cj)
                && next_is_word
                && (cj != '.'
                    || (chars[j - 1].1.is_ascii_digit()
                        && chars.get(j + 1).is_some_and(|(_, n)| n.is_ascii_digit())));
            if joins {
                j += 1;
            } else {
                break;
            }
        }

        let end = chars.get(j).map(|(b, _)| *b).unwrap_or(text.len());
        split_clitic(&text[start..end], &mut tokens);
        i = j;
    }

    tokens
}

fn split_clitic<'a>(word: &'a str, out: &mut Vec<&'a str>) {
    let normalized = word.replace('\u{2019}', "'").to_lowercase();

    if normalized.len() > 3 && normalized.ends_with("n't") {
        let cut = char_offset_from_end(word, 3);
        out.push(&word[..cut]);
        out.push(&word[cut..]);
        return;
    }

    for clitic in CLITICS {
        let n = clitic.chars().count();
        if normalized.chars().count() > n && normalized.ends_with(clitic) {
            let cut = char_offset_from_end(word, n);
            out.push(&word[..cut]);
            out.push(&word[cut..]);
            return;
        }
    }

    out.push(word);
}

fn char_offset_from_end(s: &str, n: usize) -> usize {
    s.char_indices()
        .rev()
        .nth(n - 1)
        .map(|(i, _)| i)
        .unwrap_or(0)
}

// ============ Lexicon tagger ============

/// Deterministic rule-and-lexicon tagger for English chat text.
///
/// Closed-class words come from fixed lists. Open-class words are
/// classified by lexicon membership and suffix, then ambiguous noun/verb
/// forms are resolved from the tag on their left and the word on their
/// right. Unknown capitalised words inside a sentence are proper nouns;
/// anything else unknown is a noun.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconTagger;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Lex {
    Fixed(Pos),
    NounOrVerb,
    Gerund,
    Participle,
    Open,
}

impl PosTagger for LexiconTagger {
    fn tag(&self, tokens: &[&str]) -> Vec<Pos> {
        let lex: Vec<Lex> = tokens.iter().map(|t| classify(t)).collect();
        let mut tags: Vec<Pos> = Vec::with_capacity(tokens.len());

        for (i, token) in tokens.iter().enumerate() {
            let prev = if i == 0 { None } else { Some(tags[i - 1]) };
            let sentence_start = prev.is_none()
                || (prev == Some(Pos::Punct) && matches!(tokens[i - 1], "." | "!" | "?"));
            let next = lex.get(i + 1).copied();

            let pos = match lex[i] {
                Lex::Fixed(p) => p,
                Lex::NounOrVerb => resolve_noun_or_verb(prev, next),
                Lex::Gerund => match prev {
                    Some(Pos::Det | Pos::Adj | Pos::Noun | Pos::Propn | Pos::Num) => Pos::Noun,
                    _ => Pos::Verb,
                },
                Lex::Participle => match (prev, next) {
                    (Some(Pos::Det | Pos::Adv), Some(Lex::Open | Lex::NounOrVerb))
                    | (Some(Pos::Det), _) => Pos::Adj,
                    _ => Pos::Verb,
                },
                Lex::Open => open_class(token, sentence_start),
            };
            let pos = if pos == Pos::Noun && is_subject_verb(tokens, &tags, &lex, i) {
                Pos::Verb
            } else {
                pos
            };
            tags.push(pos);
        }
        tags
    }
}

fn resolve_noun_or_verb(prev: Option<Pos>, next: Option<Lex>) -> Pos {
    match prev {
        Some(Pos::Det | Pos::Adj | Pos::Num | Pos::Noun | Pos::Propn | Pos::Adp) => Pos::Noun,
        Some(Pos::Aux | Pos::Pron | Pos::Part) => Pos::Verb,
        _ => match next {
            Some(Lex::Fixed(Pos::Det | Pos::Pron | Pos::Num)) => Pos::Verb,
            _ => Pos::Noun,
        },
    }
}

/// Whether token `i`, read as a noun so far, is instead the verb of the
/// noun on its left: "the bracket cracks under load", "the rails vibrate".
///
/// Subject and verb must agree in number (singular noun with an `-s`
/// form, plural noun with a base form) and the clause must close on the
/// right. A known noun/verb may also take a bare noun object ("the pump
/// leaks oil").
fn is_subject_verb(tokens: &[&str], tags: &[Pos], lex: &[Lex], i: usize) -> bool {
    let Some(prev) = i.checked_sub(1) else {
        return false;
    };
    if !matches!(tags[prev], Pos::Noun | Pos::Propn) {
        return false;
    }
    let word = tokens[i].to_lowercase();
    let subject_plural =
        tags[prev] == Pos::Noun && plural_stem(&tokens[prev].to_lowercase()).is_some();
    let s_form = plural_stem(&word).is_some();
    if subject_plural == s_form {
        return false;
    }

    let next = lex.get(i + 1).copied();
    let closes = matches!(
        next,
        None | Some(Lex::Fixed(
            Pos::Adj | Pos::Adv | Pos::Det | Pos::Adp | Pos::Part | Pos::Num | Pos::Pron | Pos::Punct
        ))
    );
    match lex[i] {
        Lex::NounOrVerb => closes || matches!(next, Some(Lex::Fixed(Pos::Noun) | Lex::Open)),
        Lex::Open => {
            let stem = if s_form {
                word.strip_suffix('s').unwrap_or(word.as_str())
            } else {
                word.as_str()
            };
            closes && word.chars().all(char::is_alphabetic) && !has_noun_suffix(stem)
        }
        _ => false,
    }
}

const NOUN_SUFFIXES: &[&str] = &[
    "er", "or", "ion", "ment", "ness", "ity", "ance", "ence", "ure", "age", "ism", "ist",
    "ship", "ant", "ent", "ing",
];

fn has_noun_suffix(w: &str) -> bool {
    NOUN_SUFFIXES.iter().any(|s| w.len() > s.len() + 2 && w.ends_with(s))
}

fn open_class(token: &str, sentence_start: bool) -> Pos {
    let letters: Vec<char> = token.chars().filter(|c| c.is_alphabetic()).collect();
    let all_caps = letters.len() >= 2 && letters.iter().all(|c| c.is_uppercase());
    let capitalised = token.chars().next().is_some_and(char::is_uppercase);
    if all_caps || (capitalised && !sentence_start) {
        Pos::Propn
    } else {
        Pos::Noun
    }
}

fn classify(token: &str) -> Lex {
    if !token.chars().any(char::is_alphanumeric) {
        return if token.chars().all(|c| SYMBOLS.contains(&c)) {
            Lex::Fixed(Pos::Sym)
        } else {
            Lex::Fixed(Pos::Punct)
        };
    }
    if token
        .chars()
        .all(|c| c.is_ascii_digit() || c == '.' || c == ',')
    {
        return Lex::Fixed(Pos::Num);
    }

    let lower = token.replace('\u{2019}', "'").to_lowercase();
    let w = lower.as_str();

    if let Some(pos) = closed_class(w) {
        return Lex::Fixed(pos);
    }
    if NOUNS.contains(&w) {
        return Lex::Fixed(Pos::Noun);
    }
    if ADJECTIVES.contains(&w) {
        return Lex::Fixed(Pos::Adj);
    }
    if NOUN_VERBS.contains(&w) {
        return Lex::NounOrVerb;
    }
    if VERBS.contains(&w) {
        return Lex::Fixed(Pos::Verb);
    }

    if let Some(stem) = plural_stem(w) {
        if NOUNS.contains(&stem) {
            return Lex::Fixed(Pos::Noun);
        }
        if NOUN_VERBS.contains(&stem) {
            return Lex::NounOrVerb;
        }
        if VERBS.contains(&stem) {
            return Lex::Fixed(Pos::Verb);
        }
    }

    suffix_class(w)
}

fn plural_stem(w: &str) -> Option<&str> {
    if w.len() > 4 && w.ends_with("es") && !w.ends_with("ses") {
        if let Some(stem) = w.strip_suffix('s') {
            if NOUNS.contains(&stem) || NOUN_VERBS.contains(&stem) || VERBS.contains(&stem) {
                return Some(stem);
            }
        }
        return w.strip_suffix("es");
    }
    if w.len() > 3 && w.ends_with('s') && !w.ends_with("ss") {
        return w.strip_suffix('s');
    }
    None
}

fn suffix_class(w: &str) -> Lex {
    let n = w.chars().count();
    if !w.chars().all(|c| c.is_alphabetic() || c == '-') {
        return Lex::Open;
    }
    if n > 4 && w.ends_with("ing") {
        return Lex::Gerund;
    }
    if n > 3 && w.ends_with("ed") && !w.ends_with("eed") {
        return Lex::Participle;
    }
    if n > 4 && w.ends_with("ly") {
        return Lex::Fixed(Pos::Adv);
    }
    if n > 4 && ADJ_SUFFIXES.iter().any(|s| w.ends_with(s)) {
        return Lex::Fixed(Pos::Adj);
    }
    if n > 5 && (w.ends_with("ize") || w.ends_with("ise") || w.ends_with("ify")) {
        return Lex::NounOrVerb;
    }
    Lex::Open
}

fn closed_class(w: &str) -> Option<Pos> {
    if w.ends_with("n't") || AUXILIARIES.contains(&w) {
        return Some(Pos::Aux);
    }
    if DETERMINERS.contains(&w) {
        return Some(Pos::Det);
    }
    if PRONOUNS.contains(&w) {
        return Some(Pos::Pron);
    }
    if ADPOSITIONS.contains(&w) {
        return Some(Pos::Adp);
    }
    if COORDINATORS.contains(&w) {
        return Some(Pos::Cconj);
    }
    if SUBORDINATORS.contains(&w) {
        return Some(Pos::Sconj);
    }
    if PARTICLES.contains(&w) {
        return Some(Pos::Part);
    }
    if ADVERBS.contains(&w) {
        return Some(Pos::Adv);
    }
    if INTERJECTIONS.contains(&w) {
        return Some(Pos::Intj);
    }
    if NUMBER_WORDS.contains(&w) {
        return Some(Pos::Num);
    }
    None
}

const SYMBOLS: &[char] = &['$', '%', '+', '=', '<', '>', '#', '&', '@', '*', '^', '~', '€', '£'];

const ADJ_SUFFIXES: &[&str] = &[
    "ous", "ful", "less", "able", "ible", "ive", "ical", "ic", "ish",
];

const DETERMINERS: &[&str] = &[
    "a", "an", "the", "this", "that", "these", "those", "every", "each", "some", "any", "no",
    "another", "all", "both", "either", "neither", "my", "your", "his", "its", "our", "their",
    "her", "whose", "which", "what",
];

const PRONOUNS: &[&str] = &[
    "i", "you", "he", "she", "it", "we", "they", "me", "him", "us", "them", "mine", "yours",
    "hers", "ours", "theirs", "myself", "yourself", "himself", "herself", "itself", "ourselves",
    "yourselves", "themselves", "someone", "somebody", "something", "anyone", "anybody",
    "anything", "everyone", "everybody", "everything", "nobody", "nothing", "none", "who",
    "whom", "'s",
];

const AUXILIARIES: &[&str] = &[
    "is", "am", "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does",
    "did", "will", "would", "shall", "should", "can", "could", "may", "might", "must", "ca",
    "wo", "'re", "'ll", "'ve", "'d", "'m",
];

const ADPOSITIONS: &[&str] = &[
    "in", "on", "at", "of", "for", "with", "from", "by", "about", "into", "onto", "over",
    "under", "between", "through", "during", "before", "after", "above", "below", "off",
    "without", "within", "along", "across", "behind", "near", "until", "against", "among",
    "around", "per", "via", "toward", "towards", "upon", "inside", "outside", "like",
];

const COORDINATORS: &[&str] = &["and", "or", "but", "nor", "yet", "plus", "&"];

const SUBORDINATORS: &[&str] = &[
    "if", "because", "while", "although", "though", "whether", "unless", "since", "whereas",
    "once",
];

const PARTICLES: &[&str] = &["not", "to", "n't", "up", "out", "down"];

const ADVERBS: &[&str] = &[
    "very", "really", "also", "just", "now", "then", "here", "there", "too", "again",
    "already", "still", "soon", "never", "always", "often", "sometimes", "maybe", "perhaps",
    "quite", "rather", "almost", "even", "ever", "only", "so", "how", "when", "where", "why",
    "yesterday", "tomorrow", "later", "back", "away", "else", "instead", "well", "asap",
];

const INTERJECTIONS: &[&str] = &[
    "hey", "hi", "hello", "yeah", "yes", "yep", "nope", "ok", "okay", "oh", "thanks", "thx",
    "please", "lol", "wow", "hmm", "ah", "oops",
];

const NUMBER_WORDS: &[&str] = &[
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
    "eleven", "twelve", "twenty", "hundred", "thousand", "million", "dozen",
];

/// Nouns that the suffix rules would otherwise misread.
const NOUNS: &[&str] = &[
    "bearing", "housing", "coupling", "casing", "fitting", "mounting", "wiring", "string",
    "spring", "thing", "ring", "morning", "evening", "building", "ceiling", "lunch", "speed",
    "bed", "feed", "seed", "steel", "screw", "assembly", "motor", "belt", "gantry", "bolt",
    "nut", "density", "adhesive", "material", "signal", "metal", "manual", "terminal", "total",
    "plastic", "logic", "fabric", "cafeteria", "component", "supplier", "delivery", "machine",
    "sensor", "cable", "frame", "rail", "plate", "shaft", "gear", "washer", "bracket", "pulley",
    "rotator", "tension", "team", "problem", "family", "belly", "fly", "butterfly", "today",
    "week", "day", "time", "vendor", "shipment", "batch", "drawing", "tooling", "casting",
    "coating", "sealing", "spacing", "opening", "setting", "reading", "training", "meeting",
    "hardware", "firmware", "software", "prototype", "unit", "version", "revision", "lead",
];

const ADJECTIVES: &[&str] = &[
    "new", "old", "big", "small", "large", "wooden", "same", "other", "different", "good", "bad",
    "broken", "loose", "tight", "heavy", "light", "main", "primary", "secondary", "high", "low",
    "late", "early", "first", "final", "current", "latest", "faulty", "defective", "cheap",
    "expensive", "available", "ready", "possible", "hot", "cold", "long", "short", "thin",
    "thick", "strong", "weak", "daily", "weekly", "monthly", "likely", "unlikely", "costly",
    "urgent", "critical", "worn", "rusty", "bent", "wrong", "right",
    "correct", "next", "last", "previous", "whole", "full", "empty", "free", "hard", "soft",
    "fine", "great", "sure", "wide", "narrow", "red", "black", "white", "blue", "green",
    "stainless", "aluminum", "aluminium", "extra", "spare", "several", "many", "few", "more",
    "most", "less", "least", "much", "own", "such",
];

/// Words that are regularly both nouns and verbs; context decides.
const NOUN_VERBS: &[&str] = &[
    "test", "check", "stress", "order", "ship", "update", "change", "issue", "increase",
    "decrease", "delay", "supply", "plan", "fix", "need", "use", "run", "drive", "support",
    "design", "process", "report", "cost", "price", "load", "mount", "fit", "finish", "sample",
    "schedule", "review", "request", "return", "quote", "call", "note", "stop", "start", "work",
    "crack", "leak", "jam", "measure", "rework", "help", "book", "source", "stock", "control",
    "contract", "cause", "result", "weld", "cut", "drill", "coat", "paint", "print", "wire",
    "press", "lift", "sort", "set", "turn", "rate", "count", "track", "list", "post", "file",
    "form", "look", "move", "show", "switch", "replace", "repair", "break", "install", "seal",
    "cover", "handle", "guide", "lock", "clamp", "swap", "upgrade", "answer", "question",
];

const VERBS: &[&str] = &[
    "fail", "try", "tried", "receive", "deliver", "go", "went", "gone", "come", "came", "meet",
    "met", "think", "thought", "know", "knew", "known", "say", "said", "see", "saw", "seen",
    "seem", "get", "got", "gotten", "make", "made", "want", "let", "find", "found", "keep",
    "kept", "give", "gave", "given", "take", "took", "taken", "tell", "told", "ask", "happen",
    "arrive", "remove", "add", "send", "sent", "bring", "brought", "buy", "bought", "sell",
    "sold", "pay", "paid", "wait", "hold", "held", "leave", "left", "put", "read", "write",
    "wrote", "written", "talk", "discuss", "confirm", "inform", "notify", "expect", "hope",
    "believe", "guess", "mean", "meant", "become", "became", "begin", "began", "begun",
    "broke", "overheat", "snap", "bend", "melt", "slip", "loosen", "tighten", "inspect",
    "ensure", "verify", "spoke", "spoken", "wore", "lost", "lose", "sit", "sat",
    "feel", "felt", "hear", "heard", "understand", "understood", "agree", "decide", "forget",
    "forgot", "remember", "include", "provide", "require", "consider", "suggest", "increased",
    "estimate", "investigate", "assume", "prefer", "reduce", "adjust", "align", "assemble",
    "calibrate", "lubricate", "reorder", "approve", "reject",
];

/// English stop words, compared case-insensitively.
pub const STOP_WORDS: &[&str] = &[
    "'d", "'ll", "'m", "'re", "'s", "'ve", "a", "about", "above", "across", "after",
    "afterwards", "again", "against", "all", "almost", "alone", "along", "already", "also",
    "although", "always", "am", "among", "amongst", "amount", "an", "and", "another", "any",
    "anyhow", "anyone", "anything", "anyway", "anywhere", "are", "around", "as", "at", "back",
    "be", "became", "because", "become", "becomes", "becoming", "been", "before", "beforehand",
    "behind", "being", "below", "beside", "besides", "between", "beyond", "both", "bottom",
    "but", "by", "ca", "call", "can", "cannot", "could", "did", "do", "does", "doing", "done",
    "down", "due", "during", "each", "eight", "either", "eleven", "else", "elsewhere", "empty",
    "enough", "even", "ever", "every", "everyone", "everything", "everywhere", "except", "few",
    "fifteen", "fifty", "first", "five", "for", "former", "formerly", "forty", "four", "from",
    "front", "full", "further", "get", "give", "go", "had", "has", "have", "he", "hence", "her",
    "here", "hereafter", "hereby", "herein", "hereupon", "hers", "herself", "him", "himself",
    "his", "how", "however", "hundred", "i", "if", "in", "indeed", "into", "is", "it", "its",
    "itself", "just", "keep", "last", "latter", "latterly", "least", "less", "made", "make",
    "many", "may", "me", "meanwhile", "might", "mine", "more", "moreover", "most", "mostly",
    "move", "much", "must", "my", "myself", "n't", "name", "namely", "neither", "never",
    "nevertheless", "next", "nine", "no", "nobody", "none", "noone", "nor", "not", "nothing",
    "now", "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto", "or", "other",
    "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own", "part", "per",
    "perhaps", "please", "put", "quite", "rather", "re", "really", "regarding", "same", "say",
    "see", "seem", "seemed", "seeming", "seems", "serious", "several", "she", "should", "show",
    "side", "since", "six", "sixty", "so", "some", "somehow", "someone", "something",
    "sometime", "sometimes", "somewhere", "still", "such", "take", "ten", "than", "that",
    "the", "their", "them", "themselves", "then", "thence", "there", "thereafter", "thereby",
    "therefore", "therein", "thereupon", "these", "they", "third", "this", "those", "though",
    "three", "through", "throughout", "thru", "thus", "to", "together", "too", "top", "toward",
    "towards", "twelve", "twenty", "two", "under", "unless", "until", "up", "upon", "us",
    "used", "using", "various", "very", "via", "was", "we", "well", "were", "what", "whatever",
    "when", "whence", "whenever", "where", "whereafter", "whereas", "whereby", "wherein",
    "whereupon", "wherever", "whether", "which", "while", "whither", "who", "whoever", "whole",
    "whom", "whose", "why", "will", "with", "within", "without", "would", "yet", "you", "your",
    "yours", "yourself", "yourselves",
];

pub fn is_stop_word(token: &str) -> bool {
    let lower = token.replace('\u{2019}', "'").to_lowercase();
    STOP_WORDS.contains(&lower.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(text: &str) -> Vec<String> {
        KeywordExtractor::default().extract(text)
    }

    fn tags(text: &str) -> Vec<(String, Pos)> {
        let tokens = tokenize(text);
        let tags = LexiconTagger.tag(&tokens);
        tokens.iter().map(|t| t.to_string()).zip(tags).collect()
    }

    #[test]
    fn test_tokenize_words_and_punctuation() {
        assert_eq!(
            tokenize("Belt, gantry; rotator!"),
            vec!["Belt", ",", "gantry", ";", "rotator", "!"]
        );
    }

    #[test]
    fn test_tokenize_keeps_hyphens_and_dotted_ids() {
        assert_eq!(
            tokenize("T-slot nut on 9.3.4. end-"),
            vec!["T-slot", "nut", "on", "9.3.4", ".", "end", "-"]
        );
    }

    #[test]
    fn test_tokenize_splits_clitics() {
        assert_eq!(tokenize("didn't"), vec!["did", "n't"]);
        assert_eq!(tokenize("screw's head"), vec!["screw", "'s", "head"]);
        assert_eq!(tokenize("we\u{2019}ll"), vec!["we", "\u{2019}ll"]);
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \n\t").is_empty());
    }

    #[test]
    fn test_tagging_reference_sentence() {
        let t = tags("the wooden screw stress test failed");
        let expected = [
            ("the", Pos::Det),
            ("wooden", Pos::Adj),
            ("screw", Pos::Noun),
            ("stress", Pos::Noun),
            ("test", Pos::Noun),
            ("failed", Pos::Verb),
        ];
        for ((tok, pos), (etok, epos)) in t.iter().zip(expected.iter()) {
            assert_eq!(tok, etok);
            assert_eq!(pos, epos, "tag of {tok}");
        }
    }

    #[test]
    fn test_extract_reference_sentence() {
        assert_eq!(
            extract("the wooden screw stress test failed"),
            vec!["wooden", "screw", "stress", "test"]
        );
    }

    #[test]
    fn test_gerund_after_noun_is_noun() {
        assert_eq!(
            extract("Hey the stress testing for the wooden screw failed"),
            vec!["stress", "testing", "wooden", "screw"]
        );
    }

    #[test]
    fn test_verbs_excluded() {
        assert_eq!(extract("Try increasing the density"), vec!["density"]);
    }

    #[test]
    fn test_noun_verb_resolved_by_context() {
        let t = tags("Check the belt");
        assert_eq!(t[0].1, Pos::Verb);
        let t = tags("we need to check the belt");
        assert_eq!(t[3].1, Pos::Verb);
        let t = tags("the check");
        assert_eq!(t[1].1, Pos::Noun);
    }

    #[test]
    fn test_subject_verb_s_form_after_singular_noun() {
        assert_eq!(extract("the bracket cracks under load"), vec!["bracket", "load"]);
        assert_eq!(extract("the pump leaks oil"), vec!["pump", "oil"]);
        assert_eq!(extract("the belt tension looks fine"), vec!["belt", "tension", "fine"]);
    }

    #[test]
    fn test_subject_verb_unknown_words() {
        assert_eq!(extract("the pulley wobbles"), vec!["pulley"]);
        assert_eq!(extract("the rails vibrate"), vec!["rails"]);
        assert_eq!(extract("the screws crack under load"), vec!["screws", "load"]);
    }

    #[test]
    fn test_subject_verb_keeps_noun_compounds() {
        // number does not agree, or the clause continues
        assert_eq!(extract("the belt tension"), vec!["belt", "tension"]);
        assert_eq!(extract("the gantry rollers"), vec!["gantry", "rollers"]);
        assert_eq!(
            extract("the screw stress tests failed"),
            vec!["screw", "stress", "tests"]
        );
    }

    #[test]
    fn test_hyphenated_part_names_kept() {
        assert_eq!(
            extract("The T-slot bracket cracked"),
            vec!["T-slot", "bracket"]
        );
    }

    #[test]
    fn test_numerics_and_alphanumerics_excluded() {
        assert_eq!(extract("Order 500 screws for 9.3.4 now"), vec!["screws"]);
        assert_eq!(extract("The M10 bolts arrived"), vec!["bolts"]);
    }

    #[test]
    fn test_proper_nouns_kept() {
        assert_eq!(
            extract("Hey we might not receive the screws from BondBrook"),
            vec!["screws", "BondBrook"]
        );
    }

    #[test]
    fn test_stop_words_case_insensitive() {
        assert!(is_stop_word("The"));
        assert!(is_stop_word("PART"));
        assert!(!is_stop_word("screw"));
        assert_eq!(extract("The part"), Vec::<String>::new());
    }

    #[test]
    fn test_duplicates_kept_in_order() {
        assert_eq!(
            extract("belt and belt tension"),
            vec!["belt", "belt", "tension"]
        );
    }

    #[test]
    fn test_punctuation_only_and_empty() {
        assert!(extract("").is_empty());
        assert!(extract("... !!! --").is_empty());
    }

    #[test]
    fn test_extract_all_pools_texts() {
        let ex = KeywordExtractor::default();
        let texts = vec!["", "the gantry belt", "   ", "wooden screw"];
        assert_eq!(
            ex.extract_all(&texts),
            vec!["gantry", "belt", "wooden", "screw"]
        );
        let none: Vec<String> = vec![];
        assert!(ex.extract_all(&none).is_empty());
    }

    struct AllNouns;

    impl PosTagger for AllNouns {
        fn tag(&self, tokens: &[&str]) -> Vec<Pos> {
            vec![Pos::Noun; tokens.len()]
        }
    }

    #[test]
    fn test_custom_tagger() {
        let ex = KeywordExtractor::new(Box::new(AllNouns));
        assert_eq!(
            ex.extract("the 12 failed T-slot, ok"),
            vec!["failed", "T-slot", "ok"]
        );
    }
}
