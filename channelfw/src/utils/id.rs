use std::sync::atomic::{AtomicU64, Ordering};

// connection ids begin from 1, 0 is never handed out
static ID_GEN: AtomicU64 = AtomicU64::new(1);

/// Used to generate connection ids.
pub(crate) fn gen_id() -> u64 {
    ID_GEN.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::gen_id;

    #[test]
    fn ids_are_unique_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| (0..100).map(|_| gen_id()).collect::<Vec<_>>()))
            .collect();
        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 400);
        assert!(all[0] > 0);
    }
}
