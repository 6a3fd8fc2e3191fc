/// Read-through caching against the Redis [`Cache`](crate::db::Cache).
///
/// Looks the key up first and returns the hit. On a miss the block is awaited,
/// its value is queued for a background write with the given TTL (seconds),
/// and returned. A failing cache read is logged and treated as a miss, so an
/// unavailable Redis degrades to uncached behaviour instead of failing the call.
///
/// # Example
/// ```rust,ignore
/// let vector: Vec<f32> = cached!(self.cache, key, 3600, async move {
///     self.inner.embed(text).await
/// })?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let key = $key;
        match $cache.get_from_cache(&key).await {
            Ok(Some(hit)) => Ok(hit),
            miss_or_error => {
                if let Err(e) = miss_or_error {
                    tracing::warn!(error = %e, key = %key, "Cache read failed, computing value");
                }
                match $block.await {
                    Ok(value) => {
                        $cache.set_in_background(&key, &value, $ttl);
                        Ok(value)
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }};
}
