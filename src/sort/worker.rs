use bevy::log::{debug, warn};

use crate::{
    gaussian::resource::ResourceId,
    sort::{
        counting::SortCore,
        inline::InlineSorter,
        IntervalsPayload,
        SortMetric,
        SortParams,
        SortReply,
        SortService,
        SplatCenters,
    },
};


enum SortCommand {
    Centers(ResourceId, Option<SplatCenters>),
    Intervals(IntervalsPayload),
    Sort(Vec<SortParams>, SortMetric),
}


struct SortWorker {
    commands: flume::Receiver<SortCommand>,
    replies: flume::Sender<SortReply>,
    core: SortCore,
}

impl SortWorker {
    fn run(mut self) {
        while let Ok(command) = self.commands.recv() {
            let mut batch = vec![command];
            batch.extend(self.commands.try_iter());

            // only the newest queued sort is worth running
            let last_sort = batch
                .iter()
                .rposition(|command| matches!(command, SortCommand::Sort(..)));

            for (index, command) in batch.into_iter().enumerate() {
                match command {
                    SortCommand::Centers(id, centers) => self.core.set_centers(id, centers),
                    SortCommand::Intervals(payload) => self.core.set_intervals(payload),
                    SortCommand::Sort(params, metric) => {
                        if Some(index) != last_sort {
                            continue;
                        }

                        // the owner is gone, nobody reads the reply
                        if self.replies.is_disconnected() {
                            break;
                        }

                        if let Some(reply) = self.core.sort(&params, metric) {
                            if self.replies.send(reply).is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        }

        debug!("sort worker stopped");
    }
}


/// sorts on a background thread, replies arrive on a later poll
///
/// dropping the sorter detaches the thread, which skips queued sorts and
/// exits once it sees the closed channels.
pub struct WorkerSorter {
    commands: flume::Sender<SortCommand>,
    replies: flume::Receiver<SortReply>,
}

impl WorkerSorter {
    pub fn spawn() -> std::io::Result<Self> {
        let (command_tx, command_rx) = flume::unbounded();
        let (reply_tx, reply_rx) = flume::unbounded();

        let core = SortCore::new(InlineSorter::default_fill());
        let worker = SortWorker {
            commands: command_rx,
            replies: reply_tx,
            core,
        };

        std::thread::Builder::new()
            .name("splat-sort".into())
            .spawn(move || worker.run())?;

        Ok(Self {
            commands: command_tx,
            replies: reply_rx,
        })
    }

    fn send(&self, command: SortCommand) {
        if self.commands.send(command).is_err() {
            warn!("sort worker is gone, dropping request");
        }
    }
}

impl SortService for WorkerSorter {
    fn set_centers(&mut self, id: ResourceId, centers: Option<SplatCenters>) {
        self.send(SortCommand::Centers(id, centers));
    }

    fn set_intervals(&mut self, payload: IntervalsPayload) {
        self.send(SortCommand::Intervals(payload));
    }

    fn set_sort_params(&mut self, params: Vec<SortParams>, metric: SortMetric) {
        self.send(SortCommand::Sort(params, metric));
    }

    fn poll_sorted(&mut self) -> Vec<SortReply> {
        self.replies.try_iter().collect()
    }
}
