//! Embedded-corpus generator backend.

use futures::future::BoxFuture;
use rand::{Rng, seq::IndexedRandom};

use crate::{
    dao::models::Difficulty,
    generator::{GeneratedSnippet, GeneratorError, SnippetGenerator, SnippetRequest},
};

/// Built-in generator backed by a small embedded corpus.
///
/// Serves as the fallback when no external generation service is configured,
/// and as the deterministic-enough backend for local play. Difficulty
/// formatting follows the same rules the external service is prompted with:
/// MEDIUM keeps plain multi-line text, HARD collapses everything onto one line
/// with minimal separators, HARDCORE strips all whitespace and blanks out a
/// few identifiers.
#[derive(Debug, Default, Clone)]
pub struct CannedGenerator;

impl CannedGenerator {
    /// Create the built-in generator.
    pub fn new() -> Self {
        Self
    }
}

impl SnippetGenerator for CannedGenerator {
    fn generate(
        &self,
        request: SnippetRequest,
    ) -> BoxFuture<'static, Result<GeneratedSnippet, GeneratorError>> {
        Box::pin(async move {
            if let Some(code) = request.code_to_reformat {
                let Some(language) = request.fixed_language else {
                    return Err(GeneratorError::Rejected(
                        "re-formatting requires a pinned language".into(),
                    ));
                };
                return Ok(GeneratedSnippet {
                    difficulty: request.difficulty,
                    snippet: format_snippet(request.difficulty, &code),
                    solution: language.clone(),
                    language,
                });
            }

            let candidates: Vec<&(&str, &str)> = CORPUS
                .iter()
                .filter(|(language, _)| {
                    request.languages.is_empty()
                        || request
                            .languages
                            .iter()
                            .any(|wanted| wanted.eq_ignore_ascii_case(language))
                })
                .collect();

            let mut rng = rand::rng();
            let Some(&&(language, code)) = candidates.choose(&mut rng) else {
                return Err(GeneratorError::NoLanguage);
            };

            Ok(GeneratedSnippet {
                difficulty: request.difficulty,
                language: language.to_string(),
                snippet: format_snippet(request.difficulty, code),
                solution: language.to_string(),
            })
        })
    }
}

/// Apply the difficulty formatting rules to a plain snippet.
fn format_snippet(difficulty: Difficulty, code: &str) -> String {
    match difficulty {
        // The corpus has no HTML highlighting, so EASY degrades to the
        // MEDIUM rendition here; the HTTP backend handles the difference.
        Difficulty::Easy | Difficulty::Medium => code.trim_matches('\n').to_string(),
        Difficulty::Hard => single_line(code),
        Difficulty::Hardcore => {
            let mut rng = rand::rng();
            squash(&blank_identifiers(code, &mut rng))
        }
    }
}

/// Collapse all whitespace runs into single spaces on one line.
fn single_line(code: &str) -> String {
    code.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove every whitespace character.
fn squash(code: &str) -> String {
    code.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Replace 1 to 3 identifiers (length >= 3) with a single underscore.
fn blank_identifiers(code: &str, rng: &mut impl Rng) -> String {
    let mut spans = Vec::new();
    let mut start = None;
    for (index, c) in code.char_indices() {
        let word = c.is_ascii_alphanumeric() || c == '_';
        match (start, word) {
            (None, true) => start = Some(index),
            (Some(begin), false) => {
                if index - begin >= 3 && code[begin..].starts_with(|c: char| c.is_ascii_alphabetic())
                {
                    spans.push((begin, index));
                }
                start = None;
            }
            _ => {}
        }
    }
    if let Some(begin) = start
        && code.len() - begin >= 3
    {
        spans.push((begin, code.len()));
    }

    if spans.is_empty() {
        return code.to_string();
    }

    let count = rng.random_range(1..=3usize).min(spans.len());
    let mut picked = rand::seq::index::sample(rng, spans.len(), count).into_vec();
    picked.sort_unstable();

    let mut result = code.to_string();
    for index in picked.into_iter().rev() {
        let (begin, end) = spans[index];
        result.replace_range(begin..end, "_");
    }
    result
}

/// Embedded corpus of (language, snippet) pairs.
const CORPUS: &[(&str, &str)] = &[
    (
        "Python",
        r#"
def paginate(items, page_size):
    cursor = 0
    while cursor < len(items):
        chunk = items[cursor:cursor + page_size]
        yield {"offset": cursor, "rows": chunk}
        cursor += page_size

for page in paginate(load_rows("orders.csv"), 250):
    publish("orders.page", page)
"#,
    ),
    (
        "JavaScript",
        r#"
const debounce = (fn, delay) => {
  let timer = null;
  return (...args) => {
    clearTimeout(timer);
    timer = setTimeout(() => fn.apply(null, args), delay);
  };
};

searchBox.addEventListener("input", debounce(e => {
  store.dispatch({ type: "QUERY", payload: e.target.value });
}, 300));
"#,
    ),
    (
        "Rust",
        r#"
fn merge_sorted<T: Ord + Copy>(left: &[T], right: &[T]) -> Vec<T> {
    let mut out = Vec::with_capacity(left.len() + right.len());
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        if left[i] <= right[j] {
            out.push(left[i]);
            i += 1;
        } else {
            out.push(right[j]);
            j += 1;
        }
    }
    out.extend_from_slice(&left[i..]);
    out.extend_from_slice(&right[j..]);
    out
}
"#,
    ),
    (
        "Go",
        r#"
func worker(jobs <-chan Task, results chan<- Result) {
    for task := range jobs {
        ctx, cancel := context.WithTimeout(context.Background(), 5*time.Second)
        payload, err := fetch(ctx, task.URL)
        cancel()
        if err != nil {
            results <- Result{Task: task, Err: err}
            continue
        }
        results <- Result{Task: task, Body: payload}
    }
}
"#,
    ),
    (
        "Ruby",
        r#"
class EventBus
  def initialize
    @handlers = Hash.new { |hash, key| hash[key] = [] }
  end

  def subscribe(topic, &block)
    @handlers[topic] << block
  end

  def publish(topic, payload)
    @handlers[topic].each { |handler| handler.call(payload) }
  end
end
"#,
    ),
    (
        "Haskell",
        r#"
rollingMean :: Int -> [Double] -> [Double]
rollingMean window xs
  | window <= 0 = []
  | otherwise   = map mean (windows window xs)
  where
    windows n ys = takeWhile ((== n) . length) (map (take n) (tails ys))
    mean ys = sum ys / fromIntegral (length ys)
"#,
    ),
    (
        "SQL",
        r#"
SELECT c.region,
       DATE_TRUNC('month', o.placed_at) AS month,
       SUM(o.total_cents) / 100.0 AS revenue
FROM orders o
JOIN customers c ON c.id = o.customer_id
WHERE o.status = 'fulfilled'
GROUP BY c.region, month
HAVING SUM(o.total_cents) > 50000
ORDER BY month DESC, revenue DESC;
"#,
    ),
    (
        "C",
        r#"
static size_t ring_write(ring_t *r, const uint8_t *src, size_t len) {
    size_t free_space = r->capacity - r->size;
    size_t to_copy = len < free_space ? len : free_space;
    for (size_t i = 0; i < to_copy; i++) {
        r->data[(r->head + i) % r->capacity] = src[i];
    }
    r->head = (r->head + to_copy) % r->capacity;
    r->size += to_copy;
    return to_copy;
}
"#,
    ),
    (
        "PHP",
        r#"
function normalizeHeaders(array $headers): array {
    $normalized = [];
    foreach ($headers as $name => $values) {
        $key = strtolower(trim($name));
        $normalized[$key] = is_array($values)
            ? implode(', ', $values)
            : (string) $values;
    }
    ksort($normalized);
    return $normalized;
}
"#,
    ),
    (
        "Elixir",
        r#"
defmodule RateLimiter do
  use GenServer

  def handle_call({:acquire, key}, _from, state) do
    {count, state} = Map.get_and_update(state, key, fn
      nil -> {1, 1}
      n -> {n + 1, n + 1}
    end)

    if count <= state[:limit] do
      {:reply, :ok, state}
    else
      {:reply, {:error, :throttled}, state}
    end
  end
end
"#,
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn request(difficulty: Difficulty, languages: &[&str]) -> SnippetRequest {
        SnippetRequest::new(
            difficulty,
            languages.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[tokio::test]
    async fn respects_candidate_languages() {
        let generator = CannedGenerator::new();
        for _ in 0..10 {
            let snippet = generator
                .generate(request(Difficulty::Medium, &["python", "RUST"]))
                .await
                .unwrap();
            assert!(snippet.language == "Python" || snippet.language == "Rust");
            assert_eq!(snippet.solution, snippet.language);
        }
    }

    #[tokio::test]
    async fn unknown_language_set_is_rejected() {
        let generator = CannedGenerator::new();
        let err = generator
            .generate(request(Difficulty::Easy, &["Befunge"]))
            .await
            .unwrap_err();
        assert!(matches!(err, GeneratorError::NoLanguage));
    }

    #[tokio::test]
    async fn hard_snippets_fit_on_one_line() {
        let generator = CannedGenerator::new();
        let snippet = generator
            .generate(request(Difficulty::Hard, &[]))
            .await
            .unwrap();
        assert!(!snippet.snippet.contains('\n'));
        assert!(!snippet.snippet.contains("  "));
    }

    #[tokio::test]
    async fn hardcore_snippets_have_no_whitespace_and_blanked_tokens() {
        let generator = CannedGenerator::new();
        let snippet = generator
            .generate(request(Difficulty::Hardcore, &[]))
            .await
            .unwrap();
        assert!(snippet.snippet.chars().all(|c| !c.is_whitespace()));
        assert!(snippet.snippet.contains('_'));
    }

    #[tokio::test]
    async fn reformat_pins_language_and_solution() {
        let generator = CannedGenerator::new();
        let snippet = generator
            .generate(SnippetRequest::reformat(
                Difficulty::Hard,
                "def add(a, b):\n    return a + b\n".into(),
                "Python".into(),
            ))
            .await
            .unwrap();
        assert_eq!(snippet.language, "Python");
        assert_eq!(snippet.solution, "Python");
        assert_eq!(snippet.snippet, "def add(a, b): return a + b");
    }

    #[tokio::test]
    async fn reformat_without_language_is_rejected() {
        let generator = CannedGenerator::new();
        let mut request = SnippetRequest::reformat(
            Difficulty::Hard,
            "puts 'hi'".into(),
            "Ruby".into(),
        );
        request.fixed_language = None;
        let err = generator.generate(request).await.unwrap_err();
        assert!(matches!(err, GeneratorError::Rejected(_)));
    }

    #[test]
    fn blanking_replaces_between_one_and_three_identifiers() {
        let mut rng = rand::rng();
        let code = "let total = price * quantity;";
        let blanked = blank_identifiers(code, &mut rng);
        let replaced = blanked.split('_').count() - code.matches('_').count() - 1;
        assert!((1..=3).contains(&replaced));
    }
}
