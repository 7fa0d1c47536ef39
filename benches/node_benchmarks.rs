use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dasp_signal::{self as signal, Signal};
use rtrb::RingBuffer;
use superears::nodes::{Analyser, Gain, GainMessage, RtrbSink};
use superears::{AnalyserTap, AudioGraph, BLOCK_SIZE};

/// Sine -> Gain -> Analyser -> sink, with the sink drained every block.
fn gain_chain(c: &mut Criterion) {
    c.bench_function("Gain ramp + Analyser, one block", |b| {
        let mut graph = AudioGraph::new(48_000);
        let (out_tx, mut out_rx) = RingBuffer::new(BLOCK_SIZE * 2 * 4);
        let (fft_tx, mut fft_rx) = RingBuffer::new(BLOCK_SIZE * 4);

        let mut gain = graph.add(Gain::new(1.0));
        let analyser = graph.add(Analyser::new(fft_tx)).id();
        let sink = graph.add(RtrbSink::stereo(out_tx)).id();
        graph.connect(gain.id(), analyser);
        graph.connect(analyser, sink);
        graph.set_terminal(sink);

        let mut up = true;
        b.iter(|| {
            let target = if up { 4.0 } else { 0.5 };
            up = !up;
            let _ = gain.send(GainMessage::RampTo { target, samples: 4_800 });
            graph.process();
            while out_rx.pop().is_ok() {}
            while fft_rx.pop().is_ok() {}
        })
    });
}

fn analyser_snapshot(c: &mut Criterion) {
    c.bench_function("AnalyserTap::snapshot, 256-point", |b| {
        let (mut tx, rx) = RingBuffer::new(4_096);
        let mut tap = AnalyserTap::new(rx, 256, 0.8);
        let mut sine = signal::rate(48_000.0).const_hz(440.0).sine();

        b.iter(|| {
            for _ in 0..BLOCK_SIZE * 4 {
                let _ = tx.push(sine.next() as f32);
            }
            black_box(tap.snapshot().len())
        })
    });
}

criterion_group!(benches, gain_chain, analyser_snapshot);
criterion_main!(benches);
