use super::MockQueue;
use crate::communication::CommunicationFactory;

/// Communication factory handing out handles to one shared [`MockQueue`]
#[derive(Clone, Default)]
pub struct MockCommunicationFactory {
    queue: MockQueue,
}

impl MockCommunicationFactory {
    /// Creates a new instance operating on the given queue
    pub fn new(queue: MockQueue) -> Self {
        Self { queue }
    }

    /// Queue shared by all handles created from this factory
    pub fn queue(&self) -> &MockQueue {
        &self.queue
    }
}

impl CommunicationFactory for MockCommunicationFactory {
    type QueueProvider = MockQueue;
    type NotificationPublisher = MockQueue;

    fn queue_provider(&self) -> Self::QueueProvider {
        self.queue.clone()
    }

    fn notification_publisher(&self) -> Self::NotificationPublisher {
        self.queue.clone()
    }
}
