use crate::merge::merge_into_survivor;
use synth_core::{Result, Source};
use synth_providers::ProviderGateway;

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
}

/// The embedding input text for semantic dedup (§4.C): `title +
/// abstract[:500] + authors + year`.
fn semantic_text(source: &Source) -> String {
    let abstract_snippet: String = source.abstract_text.as_deref().unwrap_or("").chars().take(500).collect();
    format!(
        "{} {} {} {}",
        source.title,
        abstract_snippet,
        source.authors.join(", "),
        source.year.map(|y| y.to_string()).unwrap_or_default()
    )
}

/// Semantic deduplication (§4.C): embeds each source's concatenation and
/// merges survivors whose cosine similarity clears `threshold`. Sources that
/// already carry an embedding (e.g. reused from an earlier stage) skip the
/// provider call.
pub async fn dedup_semantic(sources: Vec<Source>, gateway: &ProviderGateway, threshold: f32) -> Result<Vec<Source>> {
    let mut embedded: Vec<(Source, Vec<f32>)> = Vec::with_capacity(sources.len());
    for source in sources {
        let vector = match &source.embedding {
            Some(v) => v.clone(),
            None => gateway.generate_embedding(&semantic_text(&source)).await?.vector,
        };
        embedded.push((source, vector));
    }

    let mut survivors: Vec<(Source, Vec<f32>)> = Vec::new();
    'outer: for (source, vector) in embedded {
        for (survivor, survivor_vector) in survivors.iter_mut() {
            if cosine(&vector, survivor_vector) >= threshold {
                merge_into_survivor(survivor, &source, "semantic");
                continue 'outer;
            }
        }
        survivors.push((source, vector));
    }

    Ok(survivors.into_iter().map(|(s, _)| s).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        assert!((cosine(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }
}
