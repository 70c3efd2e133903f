#[cfg(test)]
mod tests {
    use urgent_pool::{
        model::Urgency,
        pool::{
            ElasticPool,
            FixedPool,
        },
        task::SyntheticTask,
    };
    use futures::future::join_all;
    use std::{
        future::Future,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::{Duration, Instant},
    };

    async fn measure<F, Fut, T>(name: &str, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let start = Instant::now();
        let result = f().await;
        let elapsed = start.elapsed();
        println!("✓ {}: {:?}", name, elapsed);
        result
    }

    async fn wait_for_counter(counter: &AtomicUsize, target: usize, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        loop {
            let current = counter.load(Ordering::SeqCst);
            if current >= target {
                return;
            }
            assert!(
                Instant::now() < deadline,
                "timeout waiting for counter: expected {}, got {}",
                target,
                current
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Считает одновременно выполняющиеся задачи одного класса
    #[derive(Default)]
    struct Concurrency {
        current: AtomicUsize,
        peak: AtomicUsize,
        done: AtomicUsize,
    }

    fn tracked(stats: &Arc<Concurrency>, work: Duration) -> impl FnOnce() + Send + 'static {
        let stats = stats.clone();
        move || {
            let now = stats.current.fetch_add(1, Ordering::SeqCst) + 1;
            stats.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(work);
            stats.current.fetch_sub(1, Ordering::SeqCst);
            stats.done.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn load_test_1_fixed_priority_schedule() {
        println!("\n=== LOAD TEST 1: FixedPool, 20 срочных + 80 обычных ===");
        let pool = FixedPool::new(10).unwrap();
        assert_eq!(pool.dedicated_urgent_workers(), 1);
        pool.start().unwrap();

        let counter = Arc::new(AtomicUsize::new(0));
        measure("100 tasks", || async {
            for i in 0..100 {
                let task = SyntheticTask::new(Duration::ZERO).with_counter(counter.clone());
                pool.schedule(Urgency::from(i < 20), task).await.unwrap();
            }
            wait_for_counter(&counter, 100, Duration::from_secs(2)).await;
        }).await;

        pool.stop().await;
        assert_eq!(counter.load(Ordering::SeqCst), 100);
        assert_eq!(pool.metrics().completed_tasks, 100);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn load_test_2_elastic_concurrent_submitters() {
        println!("\n=== LOAD TEST 2: ElasticPool, 50 отправителей ===");
        let pool = ElasticPool::new(5, 10).unwrap();
        pool.start().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        measure("200 tasks from 50 submitters", || async {
            let submitters = (0..50).map(|submitter| {
                let pool = &pool;
                let counter = counter.clone();
                async move {
                    for i in 0..4 {
                        let id = submitter * 4 + i;
                        let task = SyntheticTask::new(Duration::from_millis((id % 5) as u64))
                            .with_counter(counter.clone());
                        pool.schedule(Urgency::from(id % 3 == 0), task).await.unwrap();
                        tokio::task::yield_now().await;
                    }
                }
            });
            join_all(submitters).await;
            wait_for_counter(&counter, 200, Duration::from_secs(10)).await;
        }).await;

        pool.stop().await;
        assert_eq!(counter.load(Ordering::SeqCst), 200, "все задачи выполнены ровно один раз");
        assert_eq!(pool.active_workers(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn load_test_3_elastic_capacity_bound() {
        println!("\n=== LOAD TEST 3: Лимиты конкурентности ===");
        let pool = ElasticPool::new(2, 3).unwrap();
        pool.start().unwrap();

        let urgent = Arc::new(Concurrency::default());
        let normal = Arc::new(Concurrency::default());

        for _ in 0..40 {
            pool.schedule(Urgency::Urgent, tracked(&urgent, Duration::from_millis(3))).await.unwrap();
            pool.schedule(Urgency::Normal, tracked(&normal, Duration::from_millis(3))).await.unwrap();
        }
        pool.stop().await;

        println!(
            "  peak urgent: {}, peak normal: {}",
            urgent.peak.load(Ordering::SeqCst),
            normal.peak.load(Ordering::SeqCst)
        );
        assert!(urgent.peak.load(Ordering::SeqCst) <= 2);
        assert!(normal.peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(urgent.done.load(Ordering::SeqCst), 40);
        assert_eq!(normal.done.load(Ordering::SeqCst), 40);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn load_test_4_stop_drains_accepted_work() {
        println!("\n=== LOAD TEST 4: stop дожидается задач ===");
        let elastic = ElasticPool::new(2, 2).unwrap();
        elastic.start().unwrap();
        let fixed = FixedPool::new(2).unwrap();
        fixed.start().unwrap();

        let elastic_done = Arc::new(AtomicUsize::new(0));
        let fixed_done = Arc::new(AtomicUsize::new(0));
        for i in 0..6 {
            let urgency = Urgency::from(i % 2 == 0);
            let task = SyntheticTask::new(Duration::from_millis(40)).with_counter(elastic_done.clone());
            elastic.schedule(urgency, task).await.unwrap();
            let task = SyntheticTask::new(Duration::from_millis(10)).with_counter(fixed_done.clone());
            fixed.schedule(urgency, task).await.unwrap();
        }

        measure("stop both pools", || async {
            tokio::join!(elastic.stop(), fixed.stop());
        }).await;

        assert_eq!(elastic_done.load(Ordering::SeqCst), 6);
        assert_eq!(fixed_done.load(Ordering::SeqCst), 6);
        assert_eq!(elastic.active_workers(), 0);
        assert_eq!(fixed.active_workers(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn load_test_5_concurrent_stop_calls() {
        println!("\n=== LOAD TEST 5: Параллельные вызовы stop ===");
        let pool = ElasticPool::new(1, 1).unwrap();
        pool.start().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let task = SyntheticTask::new(Duration::from_millis(20)).with_counter(counter.clone());
            pool.schedule(Urgency::Normal, task).await.unwrap();
        }

        join_all((0..8).map(|_| pool.stop())).await;

        assert_eq!(counter.load(Ordering::SeqCst), 3, "каждый stop видит полностью остановленный пул");
        assert!(pool.is_stopped());
        assert_eq!(pool.metrics().completed_tasks, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn load_test_6_stop_survives_cancelled_call() {
        println!("\n=== LOAD TEST 6: Повторный stop после отменённого ===");
        let pool = ElasticPool::new(1, 1).unwrap();
        pool.start().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for latency in [100, 600, 0] {
            let task = SyntheticTask::new(Duration::from_millis(latency)).with_counter(counter.clone());
            pool.schedule(Urgency::Normal, task).await.unwrap();
        }

        let first = tokio::time::timeout(Duration::from_millis(250), pool.stop()).await;
        assert!(first.is_err(), "первый stop должен прерваться по таймауту");

        measure("second stop", || pool.stop()).await;

        assert_eq!(counter.load(Ordering::SeqCst), 3, "ни одна принятая задача не потеряна");
        assert_eq!(pool.active_workers(), 0);
        assert_eq!(pool.metrics().queued_tasks(), 0);
    }
}
